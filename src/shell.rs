use std::io::Write;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::{
    client::{DynPredictor, HttpPredictor},
    config::Config,
    entities::Field,
    error::{invalid_input_error, Error},
    form::{FormClient, FormState, Notifier, Status},
};

pub const HEADING: &str = "PriceOptima Dashboard";
pub const TITLE: &str = "🚗 PriceOptima - Ride Price Optimizer";
pub const FOOTER: &str = "© 2025 PriceOptima - Dynamic Pricing AI";

const HELP: &str = "\
commands:
  set <Field> <value>   update a field (also <Field>=<value>)
  submit                predict the ride price
  show                  print the form
  health                check the prediction service
  batch <file.csv>      predict every row of a csv file
  help                  print this message
  quit                  leave";

#[derive(Clone, Debug, PartialEq)]
pub enum Command {
    Set { field: Field, value: String },
    Submit,
    Show,
    Health,
    Batch { path: String },
    Help,
    Quit,
}

impl Command {
    pub fn parse(line: &str) -> Result<Option<Self>, Error> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }

        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match (word, rest) {
            ("set", rest) => {
                let (field, value) = rest
                    .split_once(|c: char| c == '=' || c.is_whitespace())
                    .ok_or_else(|| {
                        invalid_input_error().with_detail("usage: set <Field> <value>")
                    })?;
                Self::Set {
                    field: field.trim().parse()?,
                    value: value
                        .trim_start_matches(|c: char| c == '=' || c.is_whitespace())
                        .to_string(),
                }
            }
            ("batch", "") => {
                return Err(invalid_input_error().with_detail("usage: batch <file.csv>"))
            }
            ("batch", path) => Self::Batch { path: path.into() },
            ("submit", "") => Self::Submit,
            ("show", "") => Self::Show,
            ("health", "") => Self::Health,
            ("help", "") => Self::Help,
            ("quit", "") | ("exit", "") => Self::Quit,
            _ => match line.split_once('=') {
                Some((field, value)) => Self::Set {
                    field: field.trim().parse()?,
                    value: value.trim().to_string(),
                },
                None => {
                    return Err(invalid_input_error()
                        .with_detail(format!("unknown command '{}'", line)))
                }
            },
        };

        Ok(Some(command))
    }
}

pub fn render_form(state: &FormState) -> String {
    let mut out = format!("{}\n", TITLE);

    for field in Field::ALL {
        let options = field.options();
        if options.is_empty() {
            out.push_str(&format!(
                "  {:<24} {}\n",
                field.label(),
                state.request.value(field)
            ));
        } else {
            out.push_str(&format!(
                "  {:<24} {:<10} [{}]\n",
                field.label(),
                state.request.value(field),
                options.join(" | ")
            ));
        }
    }

    if let Status::AwaitingResponse { seq: _ } = state.status {
        out.push_str("Predicting...\n");
    }

    if let Some(line) = render_prediction(state) {
        out.push_str(&line);
        out.push('\n');
    }

    out
}

pub fn render_prediction(state: &FormState) -> Option<String> {
    state
        .prediction
        .map(|prediction| format!("Predicted Ride Price: {}", prediction))
}

/// Prints alerts to stderr.
pub struct ConsoleNotifier;

impl Notifier for ConsoleNotifier {
    fn alert(&self, message: &str) {
        eprintln!("! {}", message);
    }
}

pub enum Flow {
    Continue(String),
    Quit,
}

pub struct Shell {
    form: FormClient,
    predictor: DynPredictor,
}

impl Shell {
    pub fn new(predictor: DynPredictor) -> Self {
        Self {
            form: FormClient::new(predictor.clone(), Arc::new(ConsoleNotifier)),
            predictor,
        }
    }

    pub fn form(&self) -> &FormClient {
        &self.form
    }

    pub async fn execute(&self, command: Command) -> Flow {
        let output = match command {
            Command::Set { field, value } => match self.form.update_field(field, &value).await {
                Ok(()) => format!("{} = {}", field, self.form.state().await.request.value(field)),
                Err(err) => format!("{}", err),
            },
            Command::Submit => {
                // failures were already alerted by the form
                let _ = self.form.submit().await;
                render_prediction(&self.form.state().await).unwrap_or_default()
            }
            Command::Show => render_form(&self.form.state().await),
            Command::Health => match self.predictor.health().await {
                Ok(health) if health.is_ready() => "prediction service is ready".into(),
                Ok(health) => format!(
                    "prediction service status: {} (model loaded: {})",
                    health.status, health.model_loaded
                ),
                Err(err) => format!("health check failed: {}", err),
            },
            Command::Batch { path } => match self.batch(&path).await {
                Ok(output) => output,
                Err(err) => {
                    tracing::error!(path = %path, "{}", err.diagnostic());
                    format!("batch prediction failed: {}", err)
                }
            },
            Command::Help => HELP.into(),
            Command::Quit => return Flow::Quit,
        };

        Flow::Continue(output)
    }

    async fn batch(&self, path: &str) -> Result<String, Error> {
        let contents = tokio::fs::read(path).await?;
        let rows = self.predictor.predict_batch(path, contents).await?;

        let lines: Vec<String> = rows
            .iter()
            .enumerate()
            .map(|(i, row)| {
                format!(
                    "  #{:<4} {:<9} {:<9} {:<10} {}",
                    i + 1,
                    row.column(Field::LocationCategory),
                    row.column(Field::VehicleType),
                    row.column(Field::TimeOfBooking),
                    row.prediction()
                )
            })
            .collect();

        Ok(format!("{} rows\n{}", rows.len(), lines.join("\n")))
    }
}

pub async fn run(config: Config) -> Result<(), Error> {
    tracing::info!("using prediction endpoint {}", config.endpoint);

    let predictor = Arc::new(HttpPredictor::new(config)) as DynPredictor;
    let shell = Shell::new(predictor);

    println!("{}\n", HEADING);
    println!("{}", render_form(&shell.form().state().await));
    println!("type 'help' for commands");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let line = match lines.next_line().await? {
            Some(line) => line,
            None => break,
        };

        let command = match Command::parse(&line) {
            Ok(Some(command)) => command,
            Ok(None) => continue,
            Err(err) => {
                println!("{}", err);
                continue;
            }
        };

        match shell.execute(command).await {
            Flow::Continue(output) if output.is_empty() => {}
            Flow::Continue(output) => println!("{}", output),
            Flow::Quit => break,
        }
    }

    println!("\n{}", FOOTER);

    Ok(())
}
