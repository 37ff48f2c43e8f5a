//! Mock Roku debug console for manual testing
//!
//! Speaks just enough of the BrightScript debugger protocol to exercise
//! the client without hardware: it greets, drops into the prompt as if an
//! entry breakpoint hit, and answers `bt`, `threads`, `print` and the
//! step/continue commands with canned output.
//!
//! Usage: `mock_device [port]` (default 8085)

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};

const PROMPT: &str = "\r\nBrightscript Debugger> ";

fn main() {
    let port: u16 = std::env::args()
        .nth(1)
        .and_then(|p| p.parse().ok())
        .unwrap_or(8085);

    let listener = TcpListener::bind(("0.0.0.0", port)).expect("failed to bind");
    eprintln!("mock device listening on port {port}");

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                if let Err(e) = serve(stream) {
                    eprintln!("session ended: {e}");
                }
            }
            Err(e) => eprintln!("accept failed: {e}"),
        }
    }
}

fn serve(mut stream: TcpStream) -> std::io::Result<()> {
    let mut device = MockDevice::default();

    stream.write_all(b"Roku mock debug console\r\n")?;
    // Pretend the channel just hit its entry breakpoint
    stream.write_all(format!("Current Function:\r\nsub main(){PROMPT}").as_bytes())?;

    let mut buffer = String::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk)?;
        if n == 0 {
            return Ok(());
        }
        buffer.push_str(&String::from_utf8_lossy(&chunk[..n]));

        while let Some(pos) = buffer.find('\n') {
            let line = buffer[..pos].trim().to_string();
            buffer.drain(..=pos);
            stream.write_all(device.respond(&line).as_bytes())?;
        }
    }
}

struct MockDevice {
    /// name -> (type, printed value)
    variables: HashMap<String, (String, String)>,
    current_line: u32,
}

impl Default for MockDevice {
    fn default() -> Self {
        let mut variables = HashMap::new();
        variables.insert("counter".to_string(), ("Integer".to_string(), "42".to_string()));
        variables.insert("ratio".to_string(), ("Float".to_string(), "3.14".to_string()));
        variables.insert(
            "title".to_string(),
            ("String".to_string(), "Hello \"Roku\"".to_string()),
        );
        variables.insert(
            "config".to_string(),
            (
                "roAssociativeArray".to_string(),
                "roAssociativeArray\r\n{\r\n  width: 1280\r\n  height: 720\r\n}".to_string(),
            ),
        );
        variables.insert(
            "items".to_string(),
            (
                "roArray".to_string(),
                "roArray\r\n[\r\n  1\r\n  2\r\n  3\r\n]".to_string(),
            ),
        );

        Self {
            variables,
            current_line: 12,
        }
    }
}

impl MockDevice {
    fn respond(&mut self, command: &str) -> String {
        match command {
            "bt" => format!(
                "Backtrace:\r\n#1  Function dowork() As Void\r\n   file/line: pkg:/source/helpers.brs(40)\r\n#0  Sub main() As Void\r\n   file/line: pkg:/source/main.brs({}){PROMPT}",
                self.current_line
            ),
            "threads" => format!(
                "ID    Location                Source Code\r\n 0    pkg:/source/tasks.brs(8)    m.top.run = true\r\n 1*   pkg:/source/main.brs({})   print counter{PROMPT}",
                self.current_line
            ),
            "over" | "step" | "out" => {
                self.current_line += 1;
                format!("{}{PROMPT}", self.current_line)
            }
            "c" => "Running...\r\n".to_string(),
            "\x03;" => format!("Break in {}{PROMPT}", self.current_line),
            _ => {
                if let Some(expression) = command.strip_prefix("print ") {
                    self.print(expression.trim())
                } else {
                    format!("Unknown command '{command}'{PROMPT}")
                }
            }
        }
    }

    fn print(&self, expression: &str) -> String {
        // Type(x) query
        if let Some(inner) = expression
            .strip_prefix("Type(")
            .and_then(|e| e.strip_suffix(')'))
        {
            return match self.variables.get(inner.trim()) {
                Some((type_name, _)) => format!("{type_name}{PROMPT}"),
                None => format!("Invalid{PROMPT}"),
            };
        }

        // Sentinel-wrapped string print: "--string-wrap--" + x + "--string-wrap--"
        if let Some((_, rest)) = expression.split_once(" + ") {
            if let Some((name, _)) = rest.split_once(" + ") {
                if let Some((_, value)) = self.variables.get(name.trim()) {
                    return format!("--string-wrap--{value}--string-wrap--{PROMPT}");
                }
            }
        }

        match self.variables.get(expression) {
            Some((_, value)) => format!("{value}{PROMPT}"),
            None => format!("Invalid{PROMPT}"),
        }
    }
}
