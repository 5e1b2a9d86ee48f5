mod config;
mod error;
mod mpris;
mod pipeline;
mod player;
mod resolver;
mod runtime;
mod store;
mod track;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    runtime::run()
}
