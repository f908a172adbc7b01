//! Single-user shell commands.

use alloc::string::String;

/// Shell prompt written to the serial line before each command.
pub const PROMPT: &str = "shell> ";

/// Reply to `help`.
pub const HELP: &str = "help, exit, iotree, ls, cat, mounts\n";

/// A parsed command line.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Exit,
    Help,
    /// Registry dump, as text or JSON
    IoTree { json: bool },
    Ls(&'a str),
    Cat(&'a str),
    Mounts,
    /// Anything else is echoed back through the line
    Echo(&'a str),
}

impl<'a> Command<'a> {
    pub fn parse(line: &'a str) -> Self {
        let line = line.trim_end_matches(['\r', '\n']);
        match line {
            "exit" => return Command::Exit,
            "help" => return Command::Help,
            "iotree" => return Command::IoTree { json: false },
            "iotree -j" => return Command::IoTree { json: true },
            "mounts" => return Command::Mounts,
            _ => {}
        }
        if let Some(path) = argument(line, "ls ") {
            return Command::Ls(path);
        }
        if let Some(path) = argument(line, "cat ") {
            return Command::Cat(path);
        }
        Command::Echo(line)
    }
}

fn argument<'a>(line: &'a str, prefix: &str) -> Option<&'a str> {
    line.strip_prefix(prefix)
        .map(str::trim)
        .filter(|arg| !arg.is_empty())
}

/// Result of running one command line.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CommandOutcome {
    /// Text to show the user
    pub output: String,
    /// The shell should stop
    pub exit: bool,
}

impl CommandOutcome {
    pub fn output(output: String) -> Self {
        Self {
            output,
            exit: false,
        }
    }

    pub fn exit() -> Self {
        Self {
            output: String::new(),
            exit: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse() {
        assert_eq!(Command::parse("exit"), Command::Exit);
        assert_eq!(Command::parse("help\n"), Command::Help);
        assert_eq!(Command::parse("iotree"), Command::IoTree { json: false });
        assert_eq!(Command::parse("iotree -j"), Command::IoTree { json: true });
        assert_eq!(Command::parse("ls /dev"), Command::Ls("/dev"));
        assert_eq!(Command::parse("cat /etc/motd "), Command::Cat("/etc/motd"));
        assert_eq!(Command::parse("mounts"), Command::Mounts);
    }

    #[test]
    fn test_bare_commands_are_echoed() {
        assert_eq!(Command::parse("ls"), Command::Echo("ls"));
        assert_eq!(Command::parse("ls "), Command::Echo("ls "));
        assert_eq!(Command::parse("hello world"), Command::Echo("hello world"));
        assert_eq!(Command::parse("exit now"), Command::Echo("exit now"));
    }
}
