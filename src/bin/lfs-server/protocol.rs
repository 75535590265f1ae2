// @author:    olinex
// @time:      2023/12/08

// self mods

// use other mods
use thiserror_no_std::Error;

// use self mods
use linked_fs::{FileSystem, LFSError};

/// The commands understood by the server, one per line:
/// ```text
/// CREATE <filename>
/// DELETE <filename>
/// WRITE <filename> <content>
/// READ <filename>
/// LIST
/// QUIT
/// ```
#[derive(Debug, PartialEq, Eq)]
pub enum Command {
    Create(String),
    Delete(String),
    Write(String, String),
    Read(String),
    List,
    Quit,
}

#[derive(Error, Debug, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("ERROR: empty command")]
    EmptyCommand,

    #[error("ERROR: missing filename")]
    MissingFilename,

    #[error("ERROR: filename too large")]
    FilenameTooLarge,

    #[error("ERROR: Unknown command.")]
    UnknownCommand,
}

/// What the connection should do after a line was handled
#[derive(Debug, PartialEq, Eq)]
pub enum Reply {
    /// Send the line and wait for the next command
    Line(String),
    /// Send the line and close the connection
    Close(String),
}
impl Reply {
    pub fn text(&self) -> &str {
        match self {
            Reply::Line(text) | Reply::Close(text) => text,
        }
    }
}

/// Replies must fit in one line
fn one_line(text: &str) -> String {
    text.chars().filter(|c| *c != '\r' && *c != '\n').collect()
}

fn filename(part: Option<&str>, max_filename_length: usize) -> Result<String, ProtocolError> {
    match part {
        None | Some("") => Err(ProtocolError::MissingFilename),
        Some(name) if name.len() > max_filename_length => Err(ProtocolError::FilenameTooLarge),
        Some(name) => Ok(name.to_string()),
    }
}

/// Parse a command line.
/// The verb is case insensitive and the content of WRITE keeps its inner spaces.
///
/// # Arguments
/// * line: the raw line received from the client
/// * max_filename_length: names longer than this are refused here
pub fn parse(line: &str, max_filename_length: usize) -> Result<Command, ProtocolError> {
    let line = line.trim();
    if line.is_empty() {
        return Err(ProtocolError::EmptyCommand);
    }
    let mut parts = line.splitn(3, ' ');
    let verb = parts.next().unwrap_or_default().to_uppercase();
    match verb.as_str() {
        "CREATE" => Ok(Command::Create(filename(parts.next(), max_filename_length)?)),
        "DELETE" => Ok(Command::Delete(filename(parts.next(), max_filename_length)?)),
        "READ" => Ok(Command::Read(filename(parts.next(), max_filename_length)?)),
        "WRITE" => {
            let name = filename(parts.next(), max_filename_length)?;
            let content = parts.next().unwrap_or_default().to_string();
            Ok(Command::Write(name, content))
        }
        "LIST" => Ok(Command::List),
        "QUIT" => Ok(Command::Quit),
        _ => Err(ProtocolError::UnknownCommand),
    }
}

/// Flatten a file system error into the reply line
fn error_reply(err: &LFSError) -> String {
    if err.is_user() {
        format!("ERROR: {}", err)
    } else {
        error!("internal file system failure: {}", err);
        format!("ERROR: internal failure: {}", err)
    }
}

/// Run the command against the file system
pub fn execute<F: FileSystem + ?Sized>(fs: &F, command: Command) -> Reply {
    let result = match command {
        Command::Create(name) => fs
            .create_file(&name)
            .map(|_| format!("SUCCESS: File '{}' created.", name)),
        Command::Delete(name) => fs
            .delete_file(&name)
            .map(|_| format!("SUCCESS: File '{}' deleted.", name)),
        Command::Write(name, content) => fs
            .write_file(&name, content.as_bytes())
            .map(|_| format!("SUCCESS: File '{}' written.", name)),
        Command::Read(name) => fs
            .read_file(&name)
            .map(|bytes| String::from_utf8_lossy(&bytes).into_owned()),
        Command::List => Ok(fs.list_files().join(" ")),
        Command::Quit => return Reply::Close("SUCCESS: Disconnecting.".to_string()),
    };
    Reply::Line(one_line(&result.unwrap_or_else(|err| error_reply(&err))))
}

/// Parse and run one line received from a client
pub fn handle_line<F: FileSystem + ?Sized>(
    fs: &F,
    line: &str,
    max_filename_length: usize,
) -> Reply {
    match parse(line, max_filename_length) {
        Ok(command) => execute(fs, command),
        Err(err) => Reply::Line(err.to_string()),
    }
}
