use crate::core::Result;
use crate::executor::Response;
use crate::query::{Statement, UseDatabase};
use crate::resultset::ResultSet;
use crate::server::Server;
use crate::session::Session;
use std::io::{BufRead, Write};

/// Represents a parsed console command.
#[derive(Debug, PartialEq)]
pub enum Command {
    Help,
    Quit,
    Use(String),
    Databases,
    Status,
    Sql(String),
    Unknown(String),
}

/// Parses a line of console input into a `Command`.
///
/// Input starting with a colon (`:`) is a console command; anything else
/// is SQL for the current session.
pub fn parse_command(input: &str) -> Command {
    let input = input.trim();
    let trimmed = match input.strip_prefix(':') {
        Some(rest) => rest,
        None => return Command::Sql(input.to_string()),
    };
    let parts: Vec<&str> = trimmed.split_whitespace().collect();
    if parts.is_empty() {
        return Command::Unknown(input.to_string());
    }
    match parts[0] {
        "help" => Command::Help,
        "quit" | "exit" => Command::Quit,
        "use" => {
            if parts.len() >= 2 {
                Command::Use(parts[1].to_string())
            } else {
                Command::Unknown(input.to_string())
            }
        }
        "databases" => Command::Databases,
        "status" => Command::Status,
        _ => Command::Unknown(input.to_string()),
    }
}

/// Interactive shell over one session of a running server.
pub struct Console<'a> {
    server: &'a Server,
    session: Session,
    frontend: String,
}

impl<'a> Console<'a> {
    pub fn new(server: &'a Server, frontend: &str, session: Session) -> Self {
        Console {
            server,
            session,
            frontend: frontend.to_string(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Reads commands until EOF or `:quit`.
    pub fn run<R: BufRead, W: Write>(&mut self, input: R, out: &mut W) -> Result<()> {
        writeln!(out, "Connected through the {} front-end. Type :help for commands.", self.frontend)?;
        for line in input.lines() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            if !self.handle(parse_command(&line), out)? {
                break;
            }
        }
        out.flush()?;
        Ok(())
    }

    /// Handles one command; returns false when the console should exit.
    pub fn handle<W: Write>(&mut self, command: Command, out: &mut W) -> Result<bool> {
        match command {
            Command::Quit => return Ok(false),
            Command::Help => {
                writeln!(out, "Available commands:")?;
                writeln!(out, "  :help - List all available commands")?;
                writeln!(out, "  :quit - Leave the console")?;
                writeln!(out, "  :use <db> - Select the current database")?;
                writeln!(out, "  :databases - List databases")?;
                writeln!(out, "  :status - Show session and server status")?;
                writeln!(out, "\nOr enter SQL statements directly without any prefix.")?;
            }
            Command::Use(name) => {
                let stmt = Statement::Use(UseDatabase { name: name.clone() });
                match self.session.execute_statement(&stmt) {
                    Ok(_) => writeln!(out, "Database changed to {}", name)?,
                    Err(e) => writeln!(out, "Error: {}", e)?,
                }
            }
            Command::Databases => match self.server.executor().database_names() {
                Ok(names) => {
                    for name in &names {
                        writeln!(out, "{}", name)?;
                    }
                    writeln!(out, "\n({} databases)", names.len())?;
                }
                Err(e) => writeln!(out, "Error: {}", e)?,
            },
            Command::Status => {
                let ctx = self.session.context();
                writeln!(out, "connection: {}", ctx.id())?;
                writeln!(out, "front-end: {} ({:?})", self.frontend, self.session.dialect())?;
                writeln!(out, "user: {}", ctx.user().unwrap_or("-"))?;
                writeln!(out, "database: {}", ctx.database().unwrap_or("-"))?;
                writeln!(out, "server: {:?}", self.server.state())?;
            }
            Command::Sql(sql) => match self.session.execute(&sql) {
                Ok(responses) => {
                    for response in responses {
                        print_response(response, out)?;
                    }
                }
                Err(e) => writeln!(out, "Error: {}", e)?,
            },
            Command::Unknown(input) => {
                writeln!(out, "Unknown command: {} (try :help)", input)?;
            }
        }
        Ok(true)
    }
}

fn print_response<W: Write>(response: Response, out: &mut W) -> Result<()> {
    match response {
        Response::Ok => writeln!(out, "OK")?,
        Response::CopyIn { table, columns } => {
            let names: Vec<&str> = columns.iter().map(|c| c.name.as_str()).collect();
            writeln!(out, "COPY into {} expects columns: {}", table, names.join(", "))?;
        }
        Response::ResultSet(rs) => print_result_set(rs, out)?,
    }
    Ok(())
}

fn print_result_set<W: Write>(mut rs: ResultSet, out: &mut W) -> Result<()> {
    let header = match rs.schema() {
        Some(schema) => schema.names().join(" | "),
        None => {
            writeln!(out, "OK, {} rows affected", rs.rows_affected())?;
            return Ok(());
        }
    };
    writeln!(out, "{}", header)?;
    writeln!(out, "{}", "-".repeat(header.len()))?;
    let rows = rs.rows()?;
    for row in &rows {
        let cells: Vec<String> = row.values().iter().map(|v| v.to_string()).collect();
        writeln!(out, "{}", cells.join(" | "))?;
    }
    writeln!(out, "\n({} rows)", rows.len())?;
    Ok(())
}
