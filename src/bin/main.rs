use anyhow::{bail, Context, Error};
use budtender::{
    catalog::{Content, ProductFilter, StrainFilter},
    chat::{Conversation, Sender},
    endpoints::{
        GetChatHistory, GetProducts, GetStrains, Preferences, RecommendArgs,
        RecommendProducts,
    },
    flows::{
        log_out, LoginFlow, NavigationError, Navigator, Notifier, Outcome,
        SignupFlow,
    },
    forms::{LoginForm, SignupForm},
    Budtender, Config, FileStorage, GuardDecision,
};
use std::{path::PathBuf, sync::Arc};
use structopt::StructOpt;

#[tokio::main]
async fn main() -> Result<(), Error> {
    env_logger::init();
    let args = Args::from_args();

    log::debug!("Starting application with {:#?}", args);

    let config = Config::from_env().context("Invalid configuration")?;
    let storage = Arc::new(FileStorage::new(&args.credentials));
    let client = Budtender::connect(&config, storage)
        .context("Unable to create the HTTP client")?;

    // the credential file may have been edited (or half-written) since the
    // last run
    client.reconcile();

    match args.cmd {
        Command::Login { email, password } => {
            let form = LoginForm { email, password };
            let mut flow = LoginFlow::new(client.clone());
            finish(flow.submit(&form, &mut Terminal, &mut Terminal).await)?;
        },
        Command::Signup {
            name,
            email,
            password,
            confirm_password,
        } => {
            let form = SignupForm {
                name,
                email,
                confirm_password: confirm_password
                    .unwrap_or_else(|| password.clone()),
                password,
            };
            let mut flow = SignupFlow::new(client.clone());
            finish(flow.submit(&form, &mut Terminal, &mut Terminal).await)?;
        },
        Command::Logout => log_out(&client, &mut Terminal)?,
        Command::Whoami => match client.session().current().user {
            Some(user) => println!("{} <{}>", user.name, user.email),
            None => println!("Not logged in"),
        },
        Command::Products {
            search,
            benefit,
            kind,
            content,
        } => {
            guard(&client, "/products")?;
            let filter = ProductFilter {
                search: search.unwrap_or_default(),
                benefit,
                kind,
                content,
            };

            let products = client.cache().fetch::<GetProducts>(&()).await?;
            for product in filter.apply(&products) {
                println!(
                    "{} [{}] {} ({})",
                    product.sku,
                    product.kind,
                    product.basic_description,
                    product.main_benefit
                );
            }
        },
        Command::Strains {
            search,
            kind,
            effect,
            usage,
        } => {
            guard(&client, "/strains")?;
            let filter = StrainFilter {
                search: search.unwrap_or_default(),
                kind,
                effect,
                usage,
            };

            let strains = client.cache().fetch::<GetStrains>(&()).await?;
            for strain in filter.apply(&strains) {
                println!("{} ({}): {}", strain.name, strain.kind, strain.effects().join(", "));
            }
        },
        Command::Recommend {
            goals,
            experience,
            product_type,
        } => {
            guard(&client, "/")?;
            if goals.is_empty() {
                bail!("Pick at least one goal");
            }

            let args = RecommendArgs {
                preferences: Preferences {
                    goals,
                    experience,
                    product_type,
                },
            };
            let response =
                client.cache().trigger::<RecommendProducts>(&args).await?;

            for product in &response.recommendations.products {
                println!("Product: {} ({})", product.basic_description, product.sku);
            }
            for strain in &response.recommendations.strains {
                println!("Strain: {} ({})", strain.name, strain.kind);
            }
        },
        Command::Chat { message } => {
            let history = client.cache().fetch::<GetChatHistory>(&()).await?;
            let mut conversation =
                Conversation::from_history(client.cache(), &history);
            let seen = conversation.messages().len();

            let saving = conversation.send(&message.join(" ")).await;

            for msg in &conversation.messages()[seen..] {
                if msg.sender == Sender::Assistant {
                    println!("{}", msg.text);
                }
            }

            // let the background save finish before the runtime shuts down
            if let Some(saving) = saving {
                saving.await?;
            }
        },
        Command::History => {
            let history = client.cache().fetch::<GetChatHistory>(&()).await?;
            for record in &history {
                println!("[{}] you: {}", record.timestamp, record.user_message);
                println!("[{}] budtender: {}", record.timestamp, record.ai_response);
            }
        },
        Command::ClearHistory => {
            let mut conversation = Conversation::new(client.cache());
            conversation.clear().await?;
            println!("Chat history cleared");
        },
        Command::Visit { path } => match client.visit(&path) {
            GuardDecision::Allow => println!("{}", path),
            GuardDecision::Redirect(to) => println!("{} -> {}", path, to),
        },
    }

    Ok(())
}

fn guard(client: &Budtender, path: &str) -> Result<(), Error> {
    match client.visit(path) {
        GuardDecision::Allow => Ok(()),
        GuardDecision::Redirect(to) => {
            bail!("{} isn't available right now, try {} instead", path, to)
        },
    }
}

fn finish(outcome: Outcome) -> Result<(), Error> {
    match outcome {
        Outcome::Redirected(_) => Ok(()),
        Outcome::Invalid(errors) => bail!("{}", errors),
        Outcome::Rejected(reason) => bail!("{}", reason),
    }
}

/// Navigation and notifications for a terminal, where "navigating" just
/// tells the user where to go next.
struct Terminal;

impl Navigator for Terminal {
    fn replace(&mut self, path: &str) -> Result<(), NavigationError> {
        log::info!("Continue at {}", path);
        Ok(())
    }

    fn reload(&mut self, path: &str) { log::info!("Reloading {}", path); }
}

impl Notifier for Terminal {
    fn success(&mut self, message: &str) { println!("{}", message); }

    fn error(&mut self, message: &str) { eprintln!("{}", message); }
}

#[derive(Debug, StructOpt)]
struct Args {
    #[structopt(
        long = "credentials",
        default_value = "budtender.json",
        parse(from_os_str),
        help = "Where to keep the login credential"
    )]
    credentials: PathBuf,
    #[structopt(subcommand)]
    cmd: Command,
}

#[derive(Debug, StructOpt)]
enum Command {
    #[structopt(about = "Log in with your email and password")]
    Login {
        #[structopt(short = "e", long = "email")]
        email: String,
        #[structopt(short = "p", long = "password")]
        password: String,
    },
    #[structopt(about = "Create a new account")]
    Signup {
        #[structopt(short = "n", long = "name")]
        name: String,
        #[structopt(short = "e", long = "email")]
        email: String,
        #[structopt(short = "p", long = "password")]
        password: String,
        #[structopt(
            long = "confirm-password",
            help = "Defaults to the password"
        )]
        confirm_password: Option<String>,
    },
    #[structopt(about = "Forget the stored credential")]
    Logout,
    #[structopt(about = "Show who is logged in")]
    Whoami,
    #[structopt(about = "Browse the product catalogue")]
    Products {
        #[structopt(short = "s", long = "search")]
        search: Option<String>,
        #[structopt(long = "benefit")]
        benefit: Option<String>,
        #[structopt(long = "type")]
        kind: Option<String>,
        #[structopt(long = "content", help = "CBD, THC or Mushrooms")]
        content: Option<Content>,
    },
    #[structopt(about = "Browse the strain catalogue")]
    Strains {
        #[structopt(short = "s", long = "search")]
        search: Option<String>,
        #[structopt(long = "type")]
        kind: Option<String>,
        #[structopt(long = "effect")]
        effect: Option<String>,
        #[structopt(long = "usage")]
        usage: Option<String>,
    },
    #[structopt(about = "Get personalised recommendations")]
    Recommend {
        #[structopt(short = "g", long = "goal", number_of_values = 1)]
        goals: Vec<String>,
        #[structopt(long = "experience")]
        experience: String,
        #[structopt(long = "product-type")]
        product_type: String,
    },
    #[structopt(about = "Ask the budtender a question")]
    Chat {
        #[structopt(required = true)]
        message: Vec<String>,
    },
    #[structopt(about = "Show the saved conversation")]
    History,
    #[structopt(about = "Delete the saved conversation")]
    ClearHistory,
    #[structopt(about = "Check whether a page may be visited")]
    Visit { path: String },
}
