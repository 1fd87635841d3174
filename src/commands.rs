//! Operator command surface.
//!
//! Line-oriented commands mapping 1:1 onto scheduler operations, used by the
//! binary's stdin REPL. Parsing is deliberately plain: whitespace tokens,
//! with the task message after a `--` separator.

use crate::scheduler::Scheduler;
use crate::task::Task;

/// Default delivery target for tasks added from the REPL.
const REPL_CHANNEL: &str = "cli";
const REPL_CHAT_ID: &str = "operator";

/// A parsed operator command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `add <name> <cron fields> -- <message>`
    Add {
        name: String,
        cron_expr: String,
        message: String,
    },
    /// `remove <name>`
    Remove { name: String },
    /// `enable <name>`
    Enable { name: String },
    /// `disable <name>`
    Disable { name: String },
    /// `list`
    List,
    /// `get <name>`
    Get { name: String },
    /// `next <name>`
    NextRun { name: String },
    /// `help`
    Help,
}

pub const HELP_TEXT: &str = "commands:\n  \
    add <name> <cron> -- <message>   register a task (5- or 6-field cron)\n  \
    remove <name>                    unregister and delete a task\n  \
    enable <name> | disable <name>   toggle a task\n  \
    list                             show all tasks\n  \
    get <name>                       show one task\n  \
    next <name>                      show a task's next run time\n  \
    help                             this text";

/// Parse one input line. Returns a user-facing error string on bad syntax.
pub fn parse(line: &str) -> Result<Command, String> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let Some((&verb, rest)) = tokens.split_first() else {
        return Err("empty command (try 'help')".to_string());
    };

    let single_name = |rest: &[&str], usage: &str| -> Result<String, String> {
        match rest {
            [name] => Ok((*name).to_string()),
            _ => Err(format!("usage: {usage}")),
        }
    };

    match verb {
        "add" => {
            let split = rest.iter().position(|t| *t == "--");
            let Some(split) = split else {
                return Err("usage: add <name> <cron> -- <message>".to_string());
            };
            let (head, tail) = rest.split_at(split);
            let [name, cron @ ..] = head else {
                return Err("usage: add <name> <cron> -- <message>".to_string());
            };
            let message = tail[1..].join(" ");
            if cron.is_empty() || message.is_empty() {
                return Err("usage: add <name> <cron> -- <message>".to_string());
            }
            Ok(Command::Add {
                name: (*name).to_string(),
                cron_expr: cron.join(" "),
                message,
            })
        }
        "remove" => Ok(Command::Remove {
            name: single_name(rest, "remove <name>")?,
        }),
        "enable" => Ok(Command::Enable {
            name: single_name(rest, "enable <name>")?,
        }),
        "disable" => Ok(Command::Disable {
            name: single_name(rest, "disable <name>")?,
        }),
        "list" => Ok(Command::List),
        "get" => Ok(Command::Get {
            name: single_name(rest, "get <name>")?,
        }),
        "next" => Ok(Command::NextRun {
            name: single_name(rest, "next <name>")?,
        }),
        "help" => Ok(Command::Help),
        other => Err(format!("unknown command '{other}' (try 'help')")),
    }
}

/// Execute a command against the scheduler and render the response.
pub async fn execute(command: Command, scheduler: &Scheduler) -> String {
    match command {
        Command::Add {
            name,
            cron_expr,
            message,
        } => {
            let task = Task::new(&name, &cron_expr, &message, REPL_CHANNEL, REPL_CHAT_ID);
            match scheduler.add_task(task).await {
                Ok(()) => match scheduler.get_task_next_run(&name).await {
                    Some(next) => format!("task '{name}' registered, next run {}", next.to_rfc3339()),
                    None => format!("task '{name}' registered"),
                },
                Err(e) => format!("error: {e}"),
            }
        }
        Command::Remove { name } => match scheduler.remove_task(&name).await {
            Ok(()) => format!("task '{name}' removed"),
            Err(e) => format!("error: {e}"),
        },
        Command::Enable { name } => match scheduler.enable_task(&name).await {
            Ok(()) => format!("task '{name}' enabled"),
            Err(e) => format!("error: {e}"),
        },
        Command::Disable { name } => match scheduler.disable_task(&name).await {
            Ok(()) => format!("task '{name}' disabled"),
            Err(e) => format!("error: {e}"),
        },
        Command::List => {
            let tasks = scheduler.list_tasks().await;
            if tasks.is_empty() {
                return "no tasks registered".to_string();
            }
            tasks
                .iter()
                .map(|t| {
                    format!(
                        "{} [{}] cron='{}' -> {}:{}",
                        t.name,
                        if t.enabled { "on" } else { "off" },
                        t.cron_expr,
                        t.channel,
                        t.chat_id,
                    )
                })
                .collect::<Vec<_>>()
                .join("\n")
        }
        Command::Get { name } => match scheduler.get_task(&name).await {
            Some(t) => format!(
                "name: {}\nenabled: {}\ncron: {}\nmessage: {}\ntarget: {}:{}\nlast run: {}\nnext run: {}",
                t.name,
                t.enabled,
                t.cron_expr,
                t.message,
                t.channel,
                t.chat_id,
                t.last_run_at
                    .map(|ts| ts.to_rfc3339())
                    .unwrap_or_else(|| "never".to_string()),
                t.next_run_at
                    .map(|ts| ts.to_rfc3339())
                    .unwrap_or_else(|| "unscheduled".to_string()),
            ),
            None => format!("no such task: {name}"),
        },
        Command::NextRun { name } => match scheduler.get_task(&name).await {
            Some(_) => match scheduler.get_task_next_run(&name).await {
                Some(next) => format!("{name}: next run {}", next.to_rfc3339()),
                None => format!("{name}: no upcoming run"),
            },
            None => format!("no such task: {name}"),
        },
        Command::Help => HELP_TEXT.to_string(),
    }
}
