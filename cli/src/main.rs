mod commands;
mod config;
mod gsheets;
mod server;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::process;

use crate::commands::{
    cmd_cache_clear, cmd_draft_clear, cmd_draft_ingredient, cmd_draft_instruction, cmd_draft_show,
    cmd_draft_tag, cmd_food_add, cmd_food_list, cmd_food_remove, cmd_log, cmd_overview,
    cmd_recipe_list, cmd_recipe_remove, cmd_recipe_save, cmd_recipe_show, cmd_sheet_push,
    cmd_sheet_show, cmd_tag_add, cmd_tag_list, cmd_tag_remove, cmd_target_plan, cmd_target_set,
    cmd_target_show, cmd_weight_challenge, cmd_weight_history, cmd_weight_log,
};
use crate::config::Config;
use crate::gsheets::GoogleSheetsBackend;
use slank_core::cache::SheetCache;
use slank_core::service::Tracker;
use slank_core::sheets::SheetClient;

#[derive(Parser)]
#[command(
    name = "slank",
    version,
    about = "A spreadsheet-backed diet and weight tracker",
    long_about = "\n\n  ███████╗██╗      █████╗ ███╗   ██╗██╗  ██╗
  ██╔════╝██║     ██╔══██╗████╗  ██║██║ ██╔╝
  ███████╗██║     ███████║██╔██╗ ██║█████╔╝
  ╚════██║██║     ██╔══██║██║╚██╗██║██╔═██╗
  ███████║███████╗██║  ██║██║ ╚████║██║  ██╗
  ╚══════╝╚══════╝╚═╝  ╚═╝╚═╝  ╚═══╝╚═╝  ╚═╝
        every calorie has a cell.
"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show a day's food log with the energy budget
    Overview {
        /// Person whose log to show
        person: String,
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        date: Option<String>,
        /// Activity level 0-5 (sedentary to extremely active)
        #[arg(short, long, default_value = "1")]
        level: usize,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Log a food entry
    Log {
        /// Person to log for
        person: String,
        /// Food name (must exist in the food sheet)
        food: String,
        /// Quantity in the given serving unit
        quantity: f64,
        /// Serving unit: "g" or the food's named serving
        #[arg(short, long, default_value = "g")]
        serving: String,
        /// Meal: breakfast, lunch, dinner, snack
        #[arg(short, long, default_value = "snack")]
        meal: String,
        /// Date to log for (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Start the REST API server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8080")]
        port: u16,
        /// Address to bind to (default: 127.0.0.1, use 0.0.0.0 to expose to network)
        #[arg(short, long, default_value = "127.0.0.1")]
        bind: String,
        /// Disable API key authentication (for development/testing)
        #[arg(long)]
        no_auth: bool,
    },
    /// Track body weight
    Weight {
        #[command(subcommand)]
        command: WeightCommands,
    },
    /// Manage the daily deficit target
    Target {
        #[command(subcommand)]
        command: TargetCommands,
    },
    /// Manage the food sheet
    Food {
        #[command(subcommand)]
        command: FoodCommands,
    },
    /// Manage recipes
    Recipe {
        #[command(subcommand)]
        command: RecipeCommands,
    },
    /// Manage recipe tags
    Tag {
        #[command(subcommand)]
        command: TagCommands,
    },
    /// Inspect or overwrite raw sheets
    Sheet {
        #[command(subcommand)]
        command: SheetCommands,
    },
    /// Manage the local sheet cache
    Cache {
        #[command(subcommand)]
        command: CacheCommands,
    },
}

#[derive(Subcommand)]
enum WeightCommands {
    /// Log a weight entry (kg)
    Log {
        /// Person to log for
        person: String,
        /// Weight in kg
        value: f64,
        /// Date (YYYY-MM-DD or today/yesterday/tomorrow, default: today)
        #[arg(long)]
        date: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show weight history with change since the first entry
    History {
        /// Person whose history to show
        person: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Compare two people's weight loss
    Challenge {
        /// First contender
        person_a: String,
        /// Second contender
        person_b: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum TargetCommands {
    /// Show the daily deficit target
    Show {
        /// Person whose target to show
        person: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Set the daily deficit target (kcal)
    Set {
        /// Person to set the target for
        person: String,
        /// Daily calorie deficit
        deficit: f64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Compute a weight-loss pace towards a goal weight
    Plan {
        /// Person to plan for
        person: String,
        /// Desired weight in kg
        desired: f64,
        /// Goal date (YYYY-MM-DD)
        target_date: String,
        /// Current weight in kg (default: latest logged weight)
        #[arg(long)]
        current: Option<f64>,
        /// Start date (YYYY-MM-DD, default: today)
        #[arg(long)]
        start: Option<String>,
        /// Save the computed deficit as the daily target
        #[arg(long)]
        save: bool,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum FoodCommands {
    /// Add a food
    Add {
        /// Food name
        name: String,
        /// Calories per 100g
        #[arg(long)]
        calories: f64,
        /// Fat per 100g
        #[arg(long, default_value = "0")]
        fat: f64,
        /// Carbs per 100g
        #[arg(long, default_value = "0")]
        carbs: f64,
        /// Protein per 100g
        #[arg(long, default_value = "0")]
        protein: f64,
        /// Name of the food's serving (e.g. "slice(s)")
        #[arg(long, default_value = "portion(s)")]
        serving_name: String,
        /// Grams per serving
        #[arg(long, default_value = "100")]
        serving_size: f64,
        /// Food type/category
        #[arg(long, default_value = "")]
        food_type: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a food by name
    Remove {
        /// Food name
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List foods
    List {
        /// Only show foods of this type
        #[arg(short = 't', long = "type")]
        food_type: Option<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum RecipeCommands {
    /// List recipes, optionally filtered by tags
    List {
        /// Only show recipes carrying all of these tags (repeatable)
        #[arg(short = 't', long = "tag")]
        tags: Vec<String>,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Show a recipe scaled to a number of servings
    Show {
        /// Recipe name
        name: String,
        /// Servings to scale to
        #[arg(short, long, default_value = "1")]
        servings: f64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Save the current draft as a recipe
    Save {
        /// Recipe name
        name: String,
        /// Recipe description
        #[arg(short, long, default_value = "")]
        description: String,
        /// Servings the drafted quantities make
        #[arg(short, long, default_value = "1")]
        servings: f64,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a recipe by name
    Remove {
        /// Recipe name
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Build up a recipe before saving it
    Draft {
        #[command(subcommand)]
        command: DraftCommands,
    },
}

#[derive(Subcommand)]
enum DraftCommands {
    /// Add an ingredient to the draft
    Ingredient {
        /// Ingredient food name
        name: String,
        /// Quantity in the given serving unit
        quantity: f64,
        /// Serving unit: "g" or the food's named serving
        #[arg(short, long, default_value = "g")]
        serving: String,
    },
    /// Append an instruction step to the draft
    Instruction {
        /// Instruction text
        text: String,
    },
    /// Attach an existing tag to the draft
    Tag {
        /// Tag name
        tag: String,
    },
    /// Show the current draft
    Show {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Discard the current draft
    Clear,
}

#[derive(Subcommand)]
enum TagCommands {
    /// Add a tag
    Add {
        /// Tag name
        tag: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Remove a tag
    Remove {
        /// Tag name
        tag: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// List tags
    List {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum SheetCommands {
    /// Print a sheet as a table
    Show {
        /// Sheet name (e.g. "food_data" or "food_log_bela")
        name: String,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
    /// Overwrite a sheet with a local CSV file
    Push {
        /// Sheet name
        name: String,
        /// Path to the CSV file
        file: std::path::PathBuf,
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Subcommand)]
enum CacheCommands {
    /// Delete all locally cached sheets
    Clear {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli) {
        eprintln!("Error: {e:#}");
        process::exit(1);
    }
}

#[allow(clippy::too_many_lines)]
fn run(cli: Cli) -> Result<()> {
    let config = Config::load()?;

    // Cache maintenance needs no credentials or network.
    if let Commands::Cache {
        command: CacheCommands::Clear { json },
    } = cli.command
    {
        let cache = SheetCache::new(&config.cache_dir)?;
        return cmd_cache_clear(&cache, json);
    }

    // Commands run synchronously on this thread; the spreadsheet backend
    // blocks on a handle to this runtime, so it must stay multi-threaded
    // and entered for the whole dispatch.
    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to start async runtime")?;
    let _guard = rt.enter();

    let secrets = config.load_secrets()?;
    let backend = GoogleSheetsBackend::new(secrets);
    let cache = SheetCache::new(&config.cache_dir)?;
    let client = SheetClient::new(Box::new(backend), cache, config.cache_policy());
    let tracker = Tracker::new(client);

    match cli.command {
        Commands::Overview {
            person,
            date,
            level,
            json,
        } => cmd_overview(&tracker, &person, date, level, json),
        Commands::Log {
            person,
            food,
            quantity,
            serving,
            meal,
            date,
            json,
        } => cmd_log(&tracker, &person, &food, quantity, &serving, &meal, date, json),
        Commands::Serve {
            port,
            bind,
            no_auth,
        } => {
            let api_key = if no_auth {
                None
            } else {
                let (key, _new) = config.load_or_create_api_key()?;
                Some(key)
            };
            rt.block_on(server::start_server(tracker, port, &bind, api_key))
        }
        Commands::Weight { command } => match command {
            WeightCommands::Log {
                person,
                value,
                date,
                json,
            } => cmd_weight_log(&tracker, &person, value, date, json),
            WeightCommands::History { person, json } => {
                cmd_weight_history(&tracker, &person, json)
            }
            WeightCommands::Challenge {
                person_a,
                person_b,
                json,
            } => cmd_weight_challenge(&tracker, &person_a, &person_b, json),
        },
        Commands::Target { command } => match command {
            TargetCommands::Show { person, json } => cmd_target_show(&tracker, &person, json),
            TargetCommands::Set {
                person,
                deficit,
                json,
            } => cmd_target_set(&tracker, &person, deficit, json),
            TargetCommands::Plan {
                person,
                desired,
                target_date,
                current,
                start,
                save,
                json,
            } => cmd_target_plan(
                &tracker,
                &person,
                desired,
                &target_date,
                current,
                start,
                save,
                json,
            ),
        },
        Commands::Food { command } => match command {
            FoodCommands::Add {
                name,
                calories,
                fat,
                carbs,
                protein,
                serving_name,
                serving_size,
                food_type,
                json,
            } => cmd_food_add(
                &tracker,
                &name,
                calories,
                fat,
                carbs,
                protein,
                &serving_name,
                serving_size,
                &food_type,
                json,
            ),
            FoodCommands::Remove { name, json } => cmd_food_remove(&tracker, &name, json),
            FoodCommands::List { food_type, json } => {
                cmd_food_list(&tracker, food_type.as_deref(), json)
            }
        },
        Commands::Recipe { command } => match command {
            RecipeCommands::List { tags, json } => cmd_recipe_list(&tracker, &tags, json),
            RecipeCommands::Show {
                name,
                servings,
                json,
            } => cmd_recipe_show(&tracker, &name, servings, json),
            RecipeCommands::Save {
                name,
                description,
                servings,
                json,
            } => cmd_recipe_save(&tracker, &name, &description, servings, json),
            RecipeCommands::Remove { name, json } => cmd_recipe_remove(&tracker, &name, json),
            RecipeCommands::Draft { command } => match command {
                DraftCommands::Ingredient {
                    name,
                    quantity,
                    serving,
                } => cmd_draft_ingredient(&tracker, &name, quantity, &serving),
                DraftCommands::Instruction { text } => cmd_draft_instruction(&tracker, &text),
                DraftCommands::Tag { tag } => cmd_draft_tag(&tracker, &tag),
                DraftCommands::Show { json } => cmd_draft_show(&tracker, json),
                DraftCommands::Clear => cmd_draft_clear(&tracker),
            },
        },
        Commands::Tag { command } => match command {
            TagCommands::Add { tag, json } => cmd_tag_add(&tracker, &tag, json),
            TagCommands::Remove { tag, json } => cmd_tag_remove(&tracker, &tag, json),
            TagCommands::List { json } => cmd_tag_list(&tracker, json),
        },
        Commands::Sheet { command } => match command {
            SheetCommands::Show { name, json } => cmd_sheet_show(&tracker, &name, json),
            SheetCommands::Push { name, file, json } => {
                cmd_sheet_push(&tracker, &name, &file, json)
            }
        },
        Commands::Cache { .. } => unreachable!("handled before backend setup"),
    }
}
