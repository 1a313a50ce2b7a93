use polars::prelude::*;
use rayon::prelude::*;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info};

use crate::domain::FeedError;
use crate::record::{Cell, RawRow};

/// Title, date, summary, content, author. Further columns are ignored.
pub const RECORD_WIDTH: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq)]
enum FileType {
    CSV,
    PARQUET,
    ARROW,
}

#[derive(Debug)]
pub struct FileInfo {
    path: PathBuf,
    file_size: u64,
    file_type: FileType,
}

/// The data file feeding the table. Read again on every update cycle.
#[derive(Debug, Clone)]
pub struct FeedSource {
    path: PathBuf,
}

impl FeedSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn name(&self) -> String {
        self.path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("???")
            .to_string()
    }

    pub fn load(&self) -> Result<Vec<RawRow>, FeedError> {
        let file_info = Self::get_file_info(self.path.clone())?;
        let frame = match file_info.file_type {
            FileType::CSV => Self::load_csv(&file_info.path)?,
            FileType::PARQUET => Self::load_parquet(&file_info.path)?,
            FileType::ARROW => Self::load_arrow(&file_info.path)?,
        };

        let start_time = Instant::now();
        let df = frame.collect()?;
        let names: Vec<PlSmallStr> = df
            .get_column_names()
            .into_iter()
            .take(RECORD_WIDTH)
            .cloned()
            .collect();
        // Each column is converted to text in its own thread
        let columns: Result<Vec<Vec<Cell>>, PolarsError> = names
            .par_iter()
            .map(|name| Self::load_column(&df, name))
            .collect();
        let columns = columns?;

        let rows = (0..df.height())
            .map(|ridx| RawRow(columns.iter().map(|c| c[ridx].clone()).collect()))
            .collect::<Vec<RawRow>>();

        info!(
            "Loaded {} rows ({} bytes) from {} in {}ms",
            rows.len(),
            file_info.file_size,
            file_info.path.display(),
            start_time.elapsed().as_millis()
        );
        Ok(rows)
    }

    fn load_column(df: &DataFrame, col_name: &str) -> Result<Vec<Cell>, PolarsError> {
        let col = df.column(col_name)?.cast(&DataType::String)?;
        let series = col.str()?;
        debug!("Column {:?}: {} values", col_name, series.len());
        Ok(series.into_iter().map(Cell::from).collect())
    }

    fn detect_file_type(path: &Path) -> Result<FileType, FeedError> {
        match path
            .extension()
            .and_then(|s| s.to_str())
            .map(|s| s.to_uppercase())
            .as_deref()
        {
            Some("CSV") => Ok(FileType::CSV),
            Some("PARQUET") | Some("PQ") => Ok(FileType::PARQUET),
            Some("ARROW") | Some("IPC") | Some("FEATHER") => Ok(FileType::ARROW),
            _ => Err(FeedError::UnknownFileType),
        }
    }

    fn get_file_info(path: PathBuf) -> Result<FileInfo, FeedError> {
        let metadata = fs::metadata(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => FeedError::FileNotFound,
            ErrorKind::PermissionDenied => FeedError::PermissionDenied,
            _ => FeedError::IoError(e),
        })?;
        if !metadata.is_file() {
            return Err(FeedError::LoadingFailed("Not a file!".into()));
        }

        let file_size = metadata.len();
        let file_type = Self::detect_file_type(&path)?;

        Ok(FileInfo {
            path,
            file_size,
            file_type,
        })
    }

    fn load_csv(path: &Path) -> Result<LazyFrame, PolarsError> {
        LazyCsvReader::new(PlPath::Local(path.into()))
            .with_has_header(true)
            .finish()
    }

    fn load_parquet(path: &Path) -> Result<LazyFrame, PolarsError> {
        LazyFrame::scan_parquet(PlPath::Local(path.into()), ScanArgsParquet::default())
    }

    fn load_arrow(path: &Path) -> Result<LazyFrame, PolarsError> {
        LazyFrame::scan_ipc(
            PlPath::Local(path.into()),
            polars::io::ipc::IpcScanOptions,
            UnifiedScanArgs::default(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn csv_file(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".csv").tempfile().unwrap();
        write!(file, "{content}").unwrap();
        file
    }

    #[test]
    fn rows_are_read_positionally() {
        let file = csv_file(
            "title,date,summary,content,author,extra\n\
             Budget,2024-03-05,Short,\"<p>Long, with comma</p>\",Aoife,x\n\
             ,,,,,\n",
        );
        let rows = FeedSource::new(file.path().to_path_buf()).load().unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].0.len(), RECORD_WIDTH);
        assert_eq!(rows[0].0[0], Cell::from("Budget"));
        assert_eq!(rows[0].0[3], Cell::from("<p>Long, with comma</p>"));
        assert!(
            rows[1]
                .0
                .iter()
                .all(|c| matches!(c, Cell::Absent) || *c == Cell::from(""))
        );
    }

    #[test]
    fn narrow_files_give_short_rows() {
        let file = csv_file("title,date\nOnly,2024-01-01\n");
        let rows = FeedSource::new(file.path().to_path_buf()).load().unwrap();
        assert_eq!(rows[0].0.len(), 2);
    }

    #[test]
    fn fixture_loads() {
        let source = FeedSource::new(PathBuf::from("tests/fixtures/news.csv"));
        assert_eq!(source.name(), "news.csv");
        let rows = source.load().unwrap();
        assert!(rows.len() >= 5);
    }

    #[test]
    fn missing_and_unknown_files_are_errors() {
        let missing = FeedSource::new(PathBuf::from("/no/such/feed.csv"));
        assert!(matches!(missing.load(), Err(FeedError::FileNotFound)));

        let file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        let unknown = FeedSource::new(file.path().to_path_buf());
        assert!(matches!(unknown.load(), Err(FeedError::UnknownFileType)));

        let dir = tempfile::tempdir().unwrap();
        let not_a_file = FeedSource::new(dir.path().to_path_buf());
        assert!(matches!(not_a_file.load(), Err(FeedError::LoadingFailed(_))));
    }
}
