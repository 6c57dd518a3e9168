//! CSV output for rows produced during a run.
//!
//! A report is a `Serialize` row struct registered with [`define_report!`].
//! `add_report` opens `<directory>/<file_prefix><short_name>.csv` once per row
//! type; `send_report` appends a row and flushes.
use std::any::TypeId;
use std::cell::RefCell;
use std::fs::{create_dir_all, File};
use std::path::PathBuf;

use csv::Writer;

use crate::context::Context;
use crate::define_data_plugin;
use crate::error::SimError;
use crate::hashing::HashMap;
use crate::{error, trace};

pub trait Report: 'static {
    // Returns report type
    fn type_id(&self) -> TypeId;

    /// Writes this row with the writer opened for its type
    ///
    /// # Errors
    /// Returns `SimError::CsvError` if the row cannot be serialized.
    fn serialize(&self, writer: &mut Writer<File>) -> Result<(), SimError>;
}

/// Implements [`Report`] for a `Serialize` row struct
#[macro_export]
macro_rules! define_report {
    ($name:ident) => {
        impl $crate::report::Report for $name {
            fn type_id(&self) -> std::any::TypeId {
                std::any::TypeId::of::<$name>()
            }

            fn serialize(
                &self,
                writer: &mut $crate::csv::Writer<std::fs::File>,
            ) -> Result<(), $crate::error::SimError> {
                writer.serialize(self)?;
                Ok(())
            }
        }
    };
}
pub use define_report;

/// Where report files are written
#[derive(Debug, Clone)]
pub struct ReportOptions {
    pub file_prefix: String,
    pub directory: PathBuf,
    pub overwrite: bool,
}

impl Default for ReportOptions {
    fn default() -> Self {
        ReportOptions {
            file_prefix: String::new(),
            directory: PathBuf::from("."),
            overwrite: false,
        }
    }
}

impl ReportOptions {
    pub fn file_prefix(&mut self, file_prefix: &str) -> &mut ReportOptions {
        self.file_prefix = file_prefix.to_string();
        self
    }

    pub fn directory(&mut self, directory: PathBuf) -> &mut ReportOptions {
        self.directory = directory;
        self
    }

    pub fn overwrite(&mut self, overwrite: bool) -> &mut ReportOptions {
        self.overwrite = overwrite;
        self
    }

    #[must_use]
    pub fn path_for(&self, short_name: &str) -> PathBuf {
        self.directory
            .join(format!("{}{short_name}.csv", self.file_prefix))
    }
}

struct ReportData {
    file_writers: RefCell<HashMap<TypeId, Writer<File>>>,
    options: ReportOptions,
}

define_data_plugin!(
    ReportPlugin,
    ReportData,
    ReportData {
        file_writers: RefCell::new(HashMap::default()),
        options: ReportOptions::default(),
    }
);

pub trait ContextReportExt {
    /// Options used by every subsequent `add_report`
    fn report_options(&mut self) -> &mut ReportOptions;

    /// Opens the CSV file for row type `T`, creating the output directory
    ///
    /// # Errors
    /// Returns `SimError::ReportError` if the file exists and overwriting is
    /// off, or `SimError::IoError` if it cannot be created.
    fn add_report<T: Report>(&mut self, short_name: &str) -> Result<(), SimError>;

    /// Appends one row to the file opened for its type
    ///
    /// Rows without an open report, and rows that fail to serialize, are
    /// logged and dropped.
    fn send_report<T: Report>(&self, report: T);
}

impl ContextReportExt for Context {
    fn report_options(&mut self) -> &mut ReportOptions {
        &mut self.get_data_mut(ReportPlugin).options
    }

    fn add_report<T: Report>(&mut self, short_name: &str) -> Result<(), SimError> {
        let data = self.get_data_mut(ReportPlugin);
        let path = data.options.path_for(short_name);
        if !data.options.overwrite && path.exists() {
            return Err(SimError::ReportError(format!(
                "{} already exists; enable overwrite to replace it",
                path.display()
            )));
        }
        create_dir_all(&data.options.directory)?;
        let file = File::create(&path)?;
        trace!("opened report {}", path.display());
        data.file_writers
            .borrow_mut()
            .insert(TypeId::of::<T>(), Writer::from_writer(file));
        Ok(())
    }

    fn send_report<T: Report>(&self, report: T) {
        let Some(data) = self.get_data(ReportPlugin) else {
            error!("no report has been added");
            return;
        };
        let mut writers = data.file_writers.borrow_mut();
        let Some(writer) = writers.get_mut(&report.type_id()) else {
            error!("no writer found for the report type");
            return;
        };
        if let Err(e) = report.serialize(writer) {
            error!("failed to write report row: {e}");
            return;
        }
        if let Err(e) = writer.flush() {
            error!("failed to flush report: {e}");
        }
    }
}
