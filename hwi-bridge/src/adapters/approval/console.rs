use crate::domain::bridge::Origin;
use crate::ports::approval::{Approver, ApproverClosed};
use std::io::{self, BufRead, BufReader, Stderr, Stdin, Write};

/// Terminal prompt asking the operator to allow or deny an origin.
pub struct ConsoleApprover<R, W> {
    input: R,
    output: W,
}

impl ConsoleApprover<BufReader<Stdin>, Stderr> {
    pub fn stdio() -> Self {
        Self::new(BufReader::new(io::stdin()), io::stderr())
    }
}

impl<R, W> ConsoleApprover<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    fn ask(&mut self, origin: &Origin) -> io::Result<Option<bool>> {
        write!(
            self.output,
            "Website {origin} wants to access your hardware wallets. Allow? [y/N] "
        )?;
        self.output.flush()?;

        let mut line = String::new();
        if self.input.read_line(&mut line)? == 0 {
            return Err(io::Error::new(io::ErrorKind::UnexpectedEof, "input closed"));
        }
        let answer = match line.trim().to_ascii_lowercase().as_str() {
            "y" | "yes" => Some(true),
            "" | "n" | "no" => Some(false),
            _ => None,
        };
        if answer.is_none() {
            writeln!(self.output, "Please answer y or n.")?;
        }
        Ok(answer)
    }
}

impl<R, W> Approver for ConsoleApprover<R, W>
where
    R: BufRead + Send,
    W: Write + Send,
{
    fn request_decision(&mut self, origin: &Origin) -> Result<bool, ApproverClosed> {
        loop {
            match self.ask(origin) {
                Ok(Some(granted)) => return Ok(granted),
                Ok(None) => continue,
                Err(err) => return Err(ApproverClosed::new(err.to_string())),
            }
        }
    }

    fn decision_lapsed(&mut self, origin: &Origin) {
        let _ = writeln!(
            self.output,
            "Too late: the request from {origin} already timed out and was denied."
        );
        let _ = self.output.flush();
    }
}
