use log::info;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

/// Pluggable CAPTCHA recognition.
///
/// The flow only needs image bytes turned into the text the portal expects;
/// whether a human reads the image off disk or an OCR backend does it is the
/// implementor's business.
pub trait CaptchaSolver {
    fn solve(&self, image: &[u8]) -> io::Result<String>;
}

/// Human-in-the-loop solver: writes the image next to the process and reads
/// the answer from stdin.
pub struct StdinSolver {
    image_path: PathBuf,
}

impl StdinSolver {
    pub fn new(image_path: impl Into<PathBuf>) -> StdinSolver {
        StdinSolver {
            image_path: image_path.into(),
        }
    }

    pub fn image_path(&self) -> &Path {
        &self.image_path
    }
}

impl CaptchaSolver for StdinSolver {
    fn solve(&self, image: &[u8]) -> io::Result<String> {
        std::fs::write(&self.image_path, image)?;
        info!("CAPTCHA image saved to {}", self.image_path.display());

        print!("Enter the CAPTCHA shown in {}: ", self.image_path.display());
        io::stdout().flush()?;

        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        let code = line.trim().to_string();
        if code.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "empty CAPTCHA answer",
            ));
        }
        Ok(code)
    }
}
