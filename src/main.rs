use answerly::app::{AlreadyNotified, Command};

const USAGE: &str = "Answerly - browse the Q&A community from the terminal.

Usage: answerly [COMMAND]

Commands:
  status                 Show environment and login state (default)
  logout                 Clear stored credentials
  questions [keyword]    List the first page of questions
  comments <question-id> Show a question with its comments

  --version, -V          Show version and exit
  --help,    -h          Show this help message";

fn main() {
    if handle_cli_flags() {
        return;
    }

    let command = match parse_command(std::env::args().skip(1).collect()) {
        Ok(command) => command,
        Err(message) => {
            eprintln!("error: {message}\n\n{USAGE}");
            std::process::exit(2);
        }
    };

    answerly::logging::init();
    if let Err(err) = answerly::run(command) {
        if err.downcast_ref::<AlreadyNotified>().is_none() {
            eprintln!("error: {err:#}");
        }
        std::process::exit(1);
    }
}

fn handle_cli_flags() -> bool {
    let mut saw_flag = false;
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("answerly {}", answerly::VERSION);
                saw_flag = true;
            }
            "--help" | "-h" => {
                println!("{USAGE}");
                saw_flag = true;
            }
            _ => {}
        }
    }
    saw_flag
}

fn parse_command(args: Vec<String>) -> Result<Command, String> {
    let mut args = args.into_iter();
    let command = match args.next().as_deref() {
        None | Some("status") => Command::Status,
        Some("logout") => Command::Logout,
        Some("questions") => {
            let keyword = args.by_ref().collect::<Vec<_>>().join(" ");
            Command::Questions {
                keyword: (!keyword.trim().is_empty()).then_some(keyword),
            }
        }
        Some("comments") => {
            let raw = args.next().ok_or("comments needs a question id")?;
            let question_id = raw
                .parse::<i64>()
                .map_err(|_| format!("invalid question id: {raw}"))?;
            Command::Comments { question_id }
        }
        Some(other) => return Err(format!("unknown command: {other}")),
    };
    if let Some(extra) = args.next() {
        return Err(format!("unexpected argument: {extra}"));
    }
    Ok(command)
}
