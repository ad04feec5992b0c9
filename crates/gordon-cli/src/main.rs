//! gordon: command-line client for the task queue.
//!
//! Log level is controlled with `RUST_LOG` (default `info`).

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use gordon_core::{QueueConfigOverrides, Task, Taskqueue};
use serde_json::Value;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gordon")]
#[command(about = "Push, pop and inspect tasks in a Redis-backed queue", long_about = None)]
#[command(version)]
struct Cli {
    #[command(flatten)]
    connection: ConnectionArgs,

    #[command(subcommand)]
    command: Command,
}

/// Connection flags. They win over values from `--config`.
#[derive(Args, Debug, Default)]
struct ConnectionArgs {
    /// JSON config file (`RedisServer`, `RedisPort`, `RedisQueueKey`, ...)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Redis address as HOST:PORT
    #[arg(long, global = true)]
    address: Option<String>,

    #[arg(long, global = true)]
    host: Option<String>,

    #[arg(long, global = true)]
    port: Option<u16>,

    /// Prefix of every queue key
    #[arg(long, global = true)]
    queue_key: Option<String>,

    /// Connect timeout in seconds
    #[arg(long, global = true)]
    timeout: Option<f64>,
}

impl ConnectionArgs {
    fn overrides(&self) -> Result<QueueConfigOverrides> {
        let from_file = match &self.config {
            Some(path) => QueueConfigOverrides::from_file(path)
                .with_context(|| format!("loading {}", path.display()))?,
            None => QueueConfigOverrides::default(),
        };
        let from_flags = QueueConfigOverrides {
            address: self.address.clone(),
            host: self.host.clone(),
            port: self.port.map(|p| p.to_string()),
            queue_key: self.queue_key.clone(),
            timeout: self.timeout,
        };
        Ok(from_file.layered(from_flags))
    }
}

#[derive(Subcommand)]
enum Command {
    /// Enqueue a task
    Push {
        #[arg(value_name = "TYPE")]
        task_type: String,

        args: Vec<String>,

        /// Environment entry, repeatable
        #[arg(long = "env", value_name = "KEY=VALUE", value_parser = parse_env)]
        env: Vec<(String, String)>,

        /// Parse every argument as JSON first
        #[arg(long)]
        json: bool,
    },

    /// Pop the next task of a type and print it
    Pop {
        #[arg(value_name = "TYPE")]
        task_type: String,
    },

    /// Inspect failed tasks
    Failed {
        #[command(subcommand)]
        command: FailedCommand,
    },

    /// Record a failed task
    Fail {
        #[arg(value_name = "TYPE")]
        task_type: String,

        args: Vec<String>,

        #[arg(long)]
        message: String,

        /// Lifetime of the failed list, in seconds
        #[arg(long)]
        ttl: u64,
    },
}

#[derive(Subcommand)]
enum FailedCommand {
    /// Show the oldest failed task without removing it
    Peek {
        #[arg(value_name = "TYPE")]
        task_type: String,
    },
    /// Remove and print the oldest failed task
    Pop {
        #[arg(value_name = "TYPE")]
        task_type: String,
    },
    /// Move the oldest failed task back onto its live queue
    Requeue {
        #[arg(value_name = "TYPE")]
        task_type: String,
    },
}

fn parse_env(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, _)) if key.is_empty() => Err(format!("empty key in {raw:?}")),
        Some((key, value)) => Ok((key.to_string(), value.to_string())),
        None => Err(format!("expected KEY=VALUE, got {raw:?}")),
    }
}

fn build_task(task_type: &str, args: &[String], as_json: bool) -> Result<Task> {
    let mut task = Task::new(task_type);
    for raw in args {
        if as_json {
            let value: Value =
                serde_json::from_str(raw).with_context(|| format!("argument is not JSON: {raw}"))?;
            task.add_value_arg(&value);
        } else {
            task.add_arg(raw.as_str())?;
        }
    }
    Ok(task)
}

fn print_task(task: Option<Task>) {
    match task {
        Some(task) => println!("{}", task.to_json()),
        None => println!("no task found"),
    }
}

async fn run(cli: Cli) -> Result<()> {
    let overrides = cli.connection.overrides()?;
    let mut queue = Taskqueue::from_overrides(&overrides)?;
    debug!(config = ?queue.config(), "resolved connection parameters");

    match cli.command {
        Command::Push {
            task_type,
            args,
            env,
            json,
        } => {
            let mut task = build_task(&task_type, &args, json)?;
            task.set_envs(env);
            queue.enqueue(&task).await?;
            println!("pushed to {}", queue.queue_key(task.task_type()));
        }
        Command::Pop { task_type } => print_task(queue.pop_task(task_type).await?),
        Command::Failed { command } => match command {
            FailedCommand::Peek { task_type } => print_task(queue.get_failed_task(task_type).await?),
            FailedCommand::Pop { task_type } => print_task(queue.pop_failed_task(task_type).await?),
            FailedCommand::Requeue { task_type } => match queue.requeue_failed_task(task_type).await? {
                Some(task) => println!("requeued to {}", queue.queue_key(task.task_type())),
                None => println!("no task found"),
            },
        },
        Command::Fail {
            task_type,
            args,
            message,
            ttl,
        } => {
            if ttl == 0 {
                bail!("--ttl must be at least 1 second");
            }
            let mut task = build_task(&task_type, &args, false)?;
            task.set_error_message(message);
            queue.add_failed_task(&task, Duration::from_secs(ttl)).await?;
            println!("pushed to {}", queue.failed_queue_key(task.task_type()));
        }
    }

    queue.close();
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    run(Cli::parse()).await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_pairs_split_on_first_equals() {
        assert_eq!(
            parse_env("URL=a=b").unwrap(),
            ("URL".to_string(), "a=b".to_string())
        );
        assert_eq!(parse_env("EMPTY=").unwrap(), ("EMPTY".to_string(), String::new()));
        assert!(parse_env("NOVALUE").is_err());
        assert!(parse_env("=x").is_err());
    }

    #[test]
    fn json_arguments_are_structured() {
        let args = vec!["{\"a\":1}".to_string(), "5".to_string()];
        let task = build_task("t", &args, true).unwrap();
        assert_eq!(task.arg(0), Some("eyJhIjoxfQ=="));
        assert_eq!(task.arg(1), Some("5"));

        let plain = build_task("t", &args, false).unwrap();
        assert_eq!(plain.arg(0), Some("{\"a\":1}"));
    }

    #[test]
    fn invalid_json_argument_is_rejected() {
        assert!(build_task("t", &["{".to_string()], true).is_err());
    }

    #[test]
    fn flags_override_config_file_values() {
        let dir = std::env::temp_dir().join(format!("gordon-cli-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("config.json");
        std::fs::write(&path, r#"{"RedisServer":"10.0.0.1","RedisPort":"7000","RedisQueueKey":"fromfile"}"#)
            .unwrap();

        let cli = Cli::parse_from([
            "gordon",
            "--config",
            path.to_str().unwrap(),
            "--port",
            "6380",
            "pop",
            "something",
        ]);
        let overrides = cli.connection.overrides().unwrap();
        let config = gordon_core::QueueConfig::from_overrides(&overrides).unwrap();

        assert_eq!(config.host, "10.0.0.1");
        assert_eq!(config.port, 6380);
        assert_eq!(config.queue_key, "fromfile");
        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn push_accepts_repeated_env_flags() {
        let cli = Cli::parse_from([
            "gordon", "push", "mail", "a@b.c", "--env", "A=1", "--env", "B=2", "--json",
        ]);
        match cli.command {
            Command::Push { task_type, args, env, json } => {
                assert_eq!(task_type, "mail");
                assert_eq!(args, vec!["a@b.c".to_string()]);
                assert_eq!(env.len(), 2);
                assert!(json);
            }
            _ => panic!("expected push"),
        }
    }
}
