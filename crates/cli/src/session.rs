//! Dry-run automation backend.
//!
//! Treats every document as a single sheet whose used rows are its lines.
//! Opening takes a read-write handle so files held by another program
//! surface as lock errors, and saving only bumps the modification time.
//! Lets the whole pipeline run without a spreadsheet application.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use refresher_engine::{AutomationError, Document, Session, SessionFactory};
use tracing::debug;

const SHEET: &str = "Sheet1";

#[derive(Debug, Default)]
pub struct LocalFileFactory;

impl SessionFactory for LocalFileFactory {
    fn create_session(&self) -> Result<Box<dyn Session>, AutomationError> {
        Ok(Box::new(LocalSession { terminated: false }))
    }
}

struct LocalSession {
    terminated: bool,
}

impl Session for LocalSession {
    fn set_silent(&mut self, _silent: bool) -> Result<(), AutomationError> {
        Ok(())
    }

    fn open_document(&mut self, path: &Path) -> Result<Box<dyn Document>, AutomationError> {
        if self.terminated {
            return Err(AutomationError::failed("session already terminated"));
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .open(path)
            .map_err(|e| AutomationError::failed(format!("{}: {}", path.display(), e)))?;
        debug!(path = %path.display(), "opened document");
        Ok(Box::new(LocalDocument {
            path: path.to_path_buf(),
            file: Some(file),
        }))
    }

    fn terminate(&mut self) -> Result<(), AutomationError> {
        self.terminated = true;
        Ok(())
    }
}

struct LocalDocument {
    path: PathBuf,
    file: Option<File>,
}

impl LocalDocument {
    fn file(&self) -> Result<&File, AutomationError> {
        self.file
            .as_ref()
            .ok_or_else(|| AutomationError::failed(format!("{} is closed", self.path.display())))
    }
}

impl Document for LocalDocument {
    fn sheet_names(&self) -> Result<Vec<String>, AutomationError> {
        self.file()?;
        Ok(vec![SHEET.to_string()])
    }

    fn used_row_count(&self, sheet: &str) -> Result<u64, AutomationError> {
        if sheet != SHEET {
            return Err(AutomationError::failed(format!("no sheet named {}", sheet)));
        }
        let mut file = self.file()?;
        file.seek(SeekFrom::Start(0))
            .map_err(|e| AutomationError::failed(e.to_string()))?;
        let mut rows = 0;
        for line in BufReader::new(file).lines() {
            line.map_err(|e| AutomationError::failed(e.to_string()))?;
            rows += 1;
        }
        Ok(rows)
    }

    fn refresh_all_connections(&mut self) -> Result<(), AutomationError> {
        self.file()?;
        debug!(path = %self.path.display(), "no connections to refresh in dry-run mode");
        Ok(())
    }

    fn save(&mut self) -> Result<(), AutomationError> {
        self.file()?
            .set_modified(SystemTime::now())
            .map_err(|e| AutomationError::failed(format!("{}: {}", self.path.display(), e)))
    }

    fn close(&mut self, _discard_unsaved: bool) -> Result<(), AutomationError> {
        self.file.take();
        Ok(())
    }
}
