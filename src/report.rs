//! The coordinator's final tables: written as CSV and shown on the console.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use prettytable::{Row, Table};

use crate::error::{Result, StoreError};
use crate::statistic::{AuthorRow, DiversityRow, RegionRow, StatisticTable};

pub const Q1_FILE: &str = "q1.csv";
pub const Q2_FILE: &str = "q2.csv";
pub const Q3_FILE: &str = "q3.csv";

const Q1_TITLE: &str = "Q1:  The number of tweets in the various capital cities";
const Q2_TITLE: &str = "Q2:  Top 10 tweeters (in terms of the number of tweets made)";
const Q3_TITLE: &str = "Q3:  Tweeters that have tweeted in the most Greater Capital cities \
                        and the number of times they have tweeted from those locations";

const Q1_HEADER: [&str; 3] = ["Rank", "Greater Capital City", "Number of Tweets Made"];
const Q2_HEADER: [&str; 3] = ["Rank", "Author Id", "Number of Tweets Made"];
const Q3_HEADER: [&str; 3] = [
    "Rank",
    "Author Id",
    "Number of Unique City Locations and #Tweets",
];

/// Everything the coordinator reports at the end of a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FinalReport {
    pub regions: Vec<RegionRow>,
    pub authors: Vec<AuthorRow>,
    pub diversity: Vec<DiversityRow>,
}

impl FinalReport {
    /// Collects merged tables. A statistic given twice keeps the later table.
    pub fn from_tables(tables: impl IntoIterator<Item = StatisticTable>) -> Self {
        let mut report = FinalReport::default();
        for table in tables {
            match table {
                StatisticTable::RegionCounts(rows) => report.regions = rows,
                StatisticTable::TopAuthors(rows) => report.authors = rows,
                StatisticTable::AuthorDiversity(rows) => report.diversity = rows,
            }
        }
        report
    }

    fn q1_rows(&self) -> Vec<[String; 3]> {
        self.regions
            .iter()
            .enumerate()
            .map(|(i, row)| [rank_label(i), row.region.clone(), row.count.to_string()])
            .collect()
    }

    fn q2_rows(&self) -> Vec<[String; 3]> {
        self.authors
            .iter()
            .enumerate()
            .map(|(i, row)| [rank_label(i), row.author_id.to_string(), row.count.to_string()])
            .collect()
    }

    fn q3_rows(&self) -> Vec<[String; 3]> {
        self.diversity
            .iter()
            .enumerate()
            .map(|(i, row)| [rank_label(i), row.author_id.to_string(), row.message()])
            .collect()
    }

    /// Writes `q1.csv`, `q2.csv` and `q3.csv` into `dir`, creating it if needed.
    pub fn write_csv(&self, dir: impl AsRef<Path>) -> Result<Vec<PathBuf>> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|source| StoreError::Io {
            path: dir.to_path_buf(),
            source,
        })?;

        let files = [
            (Q1_FILE, Q1_HEADER, self.q1_rows()),
            (Q2_FILE, Q2_HEADER, self.q2_rows()),
            (Q3_FILE, Q3_HEADER, self.q3_rows()),
        ];
        let mut written = Vec::with_capacity(files.len());
        for (name, header, rows) in files {
            let path = dir.join(name);
            write_table(&path, &header, &rows)?;
            written.push(path);
        }
        Ok(written)
    }
}

fn rank_label(index: usize) -> String {
    format!("#{}", index + 1)
}

fn write_table(path: &Path, header: &[&str; 3], rows: &[[String; 3]]) -> Result<()> {
    let csv_err = |source| StoreError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut writer = csv::Writer::from_path(path).map_err(csv_err)?;
    writer.write_record(header).map_err(csv_err)?;
    for row in rows {
        writer.write_record(row).map_err(csv_err)?;
    }
    writer.flush().map_err(|source| StoreError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(())
}

/// One console table, with the header as its title row.
fn table(header: &[&str; 3], rows: Vec<[String; 3]>) -> Table {
    let mut table = Table::new();
    table.set_titles(Row::from(header));
    for row in rows {
        table.add_row(Row::from(row));
    }
    table
}

impl fmt::Display for FinalReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{Q1_TITLE}")?;
        write!(f, "{}", table(&Q1_HEADER, self.q1_rows()))?;
        writeln!(f)?;
        writeln!(f, "{Q2_TITLE}")?;
        write!(f, "{}", table(&Q2_HEADER, self.q2_rows()))?;
        writeln!(f)?;
        writeln!(f, "{Q3_TITLE}")?;
        write!(f, "{}", table(&Q3_HEADER, self.q3_rows()))
    }
}
