mod command;
mod config;
mod expr;
mod schema;
mod util;

fn main() -> anyhow::Result<()> {
    command::run()
}
