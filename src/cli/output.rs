//! Output formatting for CLI commands.

use std::io::{self, Write};

use crate::cli::args::OutputFormat;
use crate::error::Result;
use crate::session::{LensResponse, QueryVariation, Shape};

/// Writes a session's responses to stdout.
#[derive(Debug)]
pub struct ResponsePrinter {
    format: OutputFormat,
}

impl ResponsePrinter {
    pub fn new(format: OutputFormat) -> Self {
        ResponsePrinter { format }
    }

    pub fn print(&mut self, response: &LensResponse) -> Result<()> {
        let stdout = io::stdout();
        let mut out = stdout.lock();
        self.write(&mut out, response)
    }

    pub fn write<W: Write>(&self, out: &mut W, response: &LensResponse) -> Result<()> {
        match self.format {
            OutputFormat::Json => writeln!(out, "{}", response.to_json()?)?,
            OutputFormat::Human => write_human(out, response)?,
        }
        Ok(())
    }
}

fn write_human<W: Write>(out: &mut W, response: &LensResponse) -> io::Result<()> {
    match response {
        LensResponse::Message { message } => writeln!(out, "==> {message}"),
        LensResponse::Executing { message, progress } => match message {
            Some(message) => writeln!(out, "    [{progress:>5.1}%] {message}"),
            None => writeln!(out, "    [{progress:>5.1}%]"),
        },
        LensResponse::Queries { queries } => write_table(out, queries),
    }
}

fn shape_marker(shape: Shape) -> &'static str {
    match shape {
        Shape::Circle => "o",
        Shape::Triangle => "^",
        Shape::Cross => "x",
    }
}

fn write_table<W: Write>(out: &mut W, queries: &[QueryVariation]) -> io::Result<()> {
    writeln!(
        out,
        "{:<2} {:>6} {:>6} {:>6} {:>7}  {:<30} QUERY",
        "", "F1", "P", "R", "NUM_RET", "TRANSFORMATION"
    )?;
    for q in queries {
        writeln!(
            out,
            "{:<2} {:>6.3} {:>6.3} {:>6.3} {:>7}  {:<30} {}",
            shape_marker(q.shape),
            q.f1,
            q.precision,
            q.recall,
            q.num_ret,
            q.transformation,
            q.query.replace('\n', " ")
        )?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(format: OutputFormat, response: &LensResponse) -> String {
        let mut buffer = Vec::new();
        ResponsePrinter::new(format)
            .write(&mut buffer, response)
            .unwrap();
        String::from_utf8(buffer).unwrap()
    }

    #[test]
    fn test_json_lines() {
        let line = render(OutputFormat::Json, &LensResponse::message("Evaluating queries."));
        assert_eq!(line, "{\"type\":\"message\",\"message\":\"Evaluating queries.\"}\n");
    }

    #[test]
    fn test_human_progress() {
        assert_eq!(
            render(OutputFormat::Human, &LensResponse::executing(12.5)),
            "    [ 12.5%]\n"
        );
        assert_eq!(
            render(
                OutputFormat::Human,
                &LensResponse::executing_with("Clause Removal", 0.0)
            ),
            "    [  0.0%] Clause Removal\n"
        );
    }

    #[test]
    fn test_human_table() {
        let response = LensResponse::Queries {
            queries: vec![QueryVariation {
                query: "diabetes\ninsulin".to_string(),
                shape: Shape::Cross,
                transformation: "Original".to_string(),
                num_transformations: 0,
                precision: 1.0,
                recall: 0.5,
                f1: 0.667,
                num_ret: 2,
            }],
        };
        let text = render(OutputFormat::Human, &response);
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[1].starts_with("x"));
        assert!(lines[1].contains("Original"));
        assert!(lines[1].ends_with("diabetes insulin"));
    }
}
