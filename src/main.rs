use std::io::{self, BufRead, Write};

use dotenvy::dotenv;
use once_cell::sync::Lazy;
use tracing::info;

mod config;
mod controller;
mod imaging;
mod llm;
mod state;
mod utils;
mod workspace;

use config::CONFIG;
use controller::Controller;
use state::{GarmentKind, SessionState};
use utils::logging::init_logging;

const HELP: &str = "\
Commands (the pipeline runs in this order):
  gender <male|female|unisex>   set the search gender filter
  search <upper|lower|shoes> <terms...>   search the shopping provider
  list <upper|lower|shoes>      show the last results for a category
  pick <upper|lower|shoes> <n>  choose result n: fetch, clean, save
  photo <path>                  load your full-body photo, clean, save
  describe                      describe the photo and chosen garments
  collage                       assemble the 4-panel reference collage
  prompt                        compose the final generation prompt
  generate                      generate and save the try-on image
  show                          where the generated image landed
  status                        show session progress
  help                          this text
  quit                          exit";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenv().ok();
    // Configuration problems must surface before any network call.
    Lazy::force(&CONFIG);
    let _guards = init_logging();
    info!("Virtual try-on session starting");

    let mut controller = Controller::new();
    let mut state = SessionState::default();

    println!("Virtual Try-On (Gemini + shopping search)");
    println!("{HELP}");

    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            continue;
        };

        match command.to_lowercase().as_str() {
            "help" => println!("{HELP}"),
            "status" => controller.status(&state),
            "gender" => match words.next() {
                Some(gender) => {
                    state = state.with_gender(gender);
                    println!("Gender set to {}.", state.gender);
                }
                None => println!("Usage: gender <male|female|unisex>"),
            },
            "search" => match parse_kind(words.next()) {
                Some(kind) => {
                    let terms = words.collect::<Vec<_>>().join(" ");
                    state = controller.search(state, kind, &terms).await;
                }
                None => println!("Usage: search <upper|lower|shoes> <terms...>"),
            },
            "list" => match parse_kind(words.next()) {
                Some(kind) => controller.list(&state, kind),
                None => println!("Usage: list <upper|lower|shoes>"),
            },
            "pick" => {
                let kind = parse_kind(words.next());
                let index = words.next().and_then(|n| n.parse::<usize>().ok());
                match (kind, index) {
                    (Some(kind), Some(index)) => {
                        state = controller.pick(state, kind, index).await;
                    }
                    _ => println!("Usage: pick <upper|lower|shoes> <result number>"),
                }
            }
            "photo" => match words.next() {
                Some(path) => {
                    state = controller.photo(state, path).await;
                }
                None => println!("Usage: photo <path-to-image>"),
            },
            "describe" => {
                state = controller.describe(state).await;
            }
            "collage" => {
                state = controller.collage(state);
            }
            "prompt" => {
                state = controller.prompt(state).await;
            }
            "generate" => {
                state = controller.generate(state).await;
            }
            "show" => controller.show(&state),
            "quit" | "exit" => break,
            other => println!("Unknown command '{other}'; try `help`."),
        }
    }

    info!("Virtual try-on session ended");
    Ok(())
}

fn parse_kind(word: Option<&str>) -> Option<GarmentKind> {
    word.and_then(GarmentKind::parse)
}
