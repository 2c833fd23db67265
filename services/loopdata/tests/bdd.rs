//! BDD test entry point for the loopdata service

#[path = "bdd/world.rs"]
mod world;

#[path = "bdd/steps/mod.rs"]
mod steps;

use cucumber::World as _;
use world::LoopDataWorld;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    LoopDataWorld::run("tests/features").await;
}
