//! Scenario data: members, trades and the bundle handed to the solvers.
//!
//! A [`ScenarioBook`] stores each scenario as a list of trades between
//! members (pseudonyms); every member lives in a city. Resolving the trades
//! through the member table yields the city-level [`Sale`]s the solvers
//! work on.
//!
//! A [`Dataset`] bundles the depot, the distance matrix, the book and an
//! optional search configuration. It is stored as JSON, or read from a
//! directory of plain-text resources:
//!
//! - `distances.txt`: one line per city, `City d1 d2 ... dn`, columns in the
//!   order of the lines;
//! - `membres*`: one `pseudo City` pair per line;
//! - `scenario*`: one `seller -> buyer` trade per line. Files are numbered
//!   from 0 in file name order.

use crate::error::{DatasetError, Result, SolverError};
use crate::exact::SearchConfig;
use crate::instance::{City, Distance, DistanceMatrix, Sale, SaleProvider, Scenario, ScenarioId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// A card sold by one member to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trade {
    pub seller: String,
    pub buyer: String,
}

impl Trade {
    pub fn new(seller: impl Into<String>, buyer: impl Into<String>) -> Self {
        Trade {
            seller: seller.into(),
            buyer: buyer.into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct RawBook {
    #[serde(default)]
    members: BTreeMap<String, City>,
    #[serde(default)]
    scenarios: BTreeMap<ScenarioId, Vec<Trade>>,
}

/// Members and their scenarios. Every stored scenario is valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "RawBook", into = "RawBook")]
pub struct ScenarioBook {
    members: BTreeMap<String, City>,
    scenarios: BTreeMap<ScenarioId, Vec<Trade>>,
}

impl ScenarioBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a member, replacing the city of a known one.
    pub fn add_member(&mut self, pseudo: impl Into<String>, city: impl Into<City>) {
        self.members.insert(pseudo.into(), city.into());
    }

    pub fn members(&self) -> &BTreeMap<String, City> {
        &self.members
    }

    pub fn city_of(&self, pseudo: &str) -> Result<&City, DatasetError> {
        self.members
            .get(pseudo)
            .ok_or_else(|| DatasetError::UnknownMember(pseudo.to_string()))
    }

    /// Check a trade list: not empty, only known members, nobody selling to
    /// themselves.
    pub fn validate(&self, id: ScenarioId, trades: &[Trade]) -> Result<(), DatasetError> {
        if trades.is_empty() {
            return Err(DatasetError::InvalidScenario {
                scenario: id,
                reason: "no trades".to_string(),
            });
        }
        for trade in trades {
            self.city_of(&trade.seller)?;
            self.city_of(&trade.buyer)?;
            if trade.seller == trade.buyer {
                return Err(DatasetError::InvalidScenario {
                    scenario: id,
                    reason: format!("{} trades with themselves", trade.seller),
                });
            }
        }
        Ok(())
    }

    /// Validate and store a scenario under `id`, replacing any previous one.
    pub fn add_scenario(&mut self, id: ScenarioId, trades: Vec<Trade>) -> Result<(), DatasetError> {
        self.validate(id, &trades)?;
        if self.scenarios.insert(id, trades).is_some() {
            log::info!("scenario {} replaced", id);
        } else {
            log::debug!("scenario {} added ({} scenarios)", id, self.scenarios.len());
        }
        Ok(())
    }

    /// Smallest identifier above every stored one.
    pub fn next_scenario_id(&self) -> ScenarioId {
        self.scenarios.keys().next_back().map_or(0, |id| id + 1)
    }

    pub fn scenario_ids(&self) -> Vec<ScenarioId> {
        self.scenarios.keys().copied().collect()
    }

    pub fn trades(&self, id: ScenarioId) -> Option<&[Trade]> {
        self.scenarios.get(&id).map(Vec::as_slice)
    }

    pub fn len(&self) -> usize {
        self.scenarios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scenarios.is_empty()
    }
}

impl SaleProvider for ScenarioBook {
    fn sales_for_scenario(&self, id: ScenarioId) -> Result<Vec<Sale>> {
        let trades = self
            .scenarios
            .get(&id)
            .ok_or(SolverError::UnknownScenario(id))?;
        // Members of stored scenarios are always known
        Ok(trades
            .iter()
            .filter_map(|t| {
                let vendor = self.members.get(&t.seller)?;
                let buyer = self.members.get(&t.buyer)?;
                Some(Sale::new(vendor.clone(), buyer.clone()))
            })
            .collect())
    }
}

impl TryFrom<RawBook> for ScenarioBook {
    type Error = DatasetError;

    fn try_from(raw: RawBook) -> Result<Self, DatasetError> {
        let mut book = ScenarioBook {
            members: raw.members,
            scenarios: BTreeMap::new(),
        };
        for (id, trades) in raw.scenarios {
            book.add_scenario(id, trades)?;
        }
        Ok(book)
    }
}

impl From<ScenarioBook> for RawBook {
    fn from(book: ScenarioBook) -> Self {
        RawBook {
            members: book.members,
            scenarios: book.scenarios,
        }
    }
}

/// Depot, distances, scenarios and search settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub name: String,
    pub depot: City,
    pub distances: DistanceMatrix,
    pub book: ScenarioBook,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<SearchConfig>,
}

impl Dataset {
    /// Load a JSON dataset and check it.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, DatasetError> {
        let content = fs::read_to_string(&path)?;
        let dataset: Dataset = serde_json::from_str(&content)?;
        dataset.validate()?;
        log::info!(
            "loaded dataset {} ({} cities, {} scenarios)",
            dataset.name,
            dataset.distances.len(),
            dataset.book.len()
        );
        Ok(dataset)
    }

    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<(), DatasetError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    /// Read a directory of plain-text resources (see the module docs).
    pub fn from_resource_dir<P: AsRef<Path>>(
        dir: P,
        depot: impl Into<City>,
    ) -> Result<Self, DatasetError> {
        let dir = dir.as_ref();
        let mut entries: Vec<_> = fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .collect();
        entries.sort();

        let mut distances = None;
        let mut book = ScenarioBook::new();
        let mut scenario_files = Vec::new();

        for path in &entries {
            let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if file_name == "distances.txt" {
                distances = Some(parse_distances(file_name, &fs::read_to_string(path)?)?);
            } else if file_name.starts_with("membres") {
                parse_members(file_name, &fs::read_to_string(path)?, &mut book)?;
            } else if file_name.starts_with("scenario") {
                scenario_files.push(path);
            }
        }

        // Members must be known before trades can be validated
        for (id, path) in scenario_files.into_iter().enumerate() {
            let file_name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
            let trades = parse_trades(file_name, &fs::read_to_string(path)?)?;
            book.add_scenario(id as ScenarioId, trades)?;
        }

        let distances = distances.ok_or_else(|| {
            DatasetError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("no distances.txt in {}", dir.display()),
            ))
        })?;

        let dataset = Dataset {
            name: dir
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or("resources")
                .to_string(),
            depot: depot.into(),
            distances,
            book,
            search: None,
        };
        dataset.validate()?;
        Ok(dataset)
    }

    /// Depot and member cities must all be in the distance matrix.
    pub fn validate(&self) -> Result<(), DatasetError> {
        if !self.distances.contains(&self.depot) {
            return Err(SolverError::UnknownCity(self.depot.clone()).into());
        }
        for city in self.book.members().values() {
            if !self.distances.contains(city) {
                return Err(SolverError::UnknownCity(city.clone()).into());
            }
        }
        Ok(())
    }

    pub fn scenario(&self, id: ScenarioId) -> Result<Scenario> {
        Scenario::load(&self.book, id, self.depot.clone())
    }

    pub fn scenarios(&self) -> Result<Vec<Scenario>> {
        self.book
            .scenario_ids()
            .into_iter()
            .map(|id| self.scenario(id))
            .collect()
    }

    pub fn search_config(&self) -> SearchConfig {
        self.search.clone().unwrap_or_default()
    }

    pub fn statistics(&self) -> DatasetStatistics {
        let n = self.distances.len();
        let mut distances: Vec<Distance> = Vec::new();
        for i in 0..n {
            for j in 0..n {
                if i != j {
                    distances.push(self.distances.get(i, j));
                }
            }
        }
        let avg_distance = if distances.is_empty() {
            0.0
        } else {
            distances.iter().sum::<Distance>() as f64 / distances.len() as f64
        };
        let sales_per_scenario: Vec<usize> = self
            .book
            .scenario_ids()
            .iter()
            .filter_map(|&id| self.book.trades(id))
            .map(|trades| trades.len())
            .collect();

        DatasetStatistics {
            name: self.name.clone(),
            depot: self.depot.clone(),
            num_cities: n,
            num_members: self.book.members().len(),
            num_scenarios: self.book.len(),
            total_sales: sales_per_scenario.iter().sum(),
            max_sales: sales_per_scenario.iter().copied().max().unwrap_or(0),
            avg_distance,
            max_distance: distances.iter().copied().max().unwrap_or(0),
            symmetric: self.distances.is_symmetric(),
        }
    }
}

/// Summary of a dataset
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatasetStatistics {
    pub name: String,
    pub depot: City,
    pub num_cities: usize,
    pub num_members: usize,
    pub num_scenarios: usize,
    pub total_sales: usize,
    pub max_sales: usize,
    pub avg_distance: f64,
    pub max_distance: Distance,
    pub symmetric: bool,
}

impl std::fmt::Display for DatasetStatistics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Dataset: {}", self.name)?;
        writeln!(f, "  Depot: {}", self.depot)?;
        writeln!(f, "  Cities: {}", self.num_cities)?;
        writeln!(f, "  Members: {}", self.num_members)?;
        writeln!(f, "  Scenarios: {}", self.num_scenarios)?;
        writeln!(f, "  Sales: {} (max {} per scenario)", self.total_sales, self.max_sales)?;
        writeln!(f, "  Avg distance: {:.2}", self.avg_distance)?;
        writeln!(f, "  Max distance: {}", self.max_distance)?;
        write!(f, "  Symmetric: {}", if self.symmetric { "yes" } else { "no" })
    }
}

fn parse_error(file: &str, line: usize, message: impl Into<String>) -> DatasetError {
    DatasetError::Parse {
        file: file.to_string(),
        line,
        message: message.into(),
    }
}

/// `City d1 d2 ... dn` lines; blank lines are skipped.
pub fn parse_distances(file: &str, content: &str) -> Result<DistanceMatrix, DatasetError> {
    let mut cities = Vec::new();
    let mut rows = Vec::new();
    for (no, line) in content.lines().enumerate() {
        let mut tokens = line.split_whitespace();
        let Some(city) = tokens.next() else {
            continue;
        };
        let row = tokens
            .map(|t| {
                t.parse::<Distance>()
                    .map_err(|_| parse_error(file, no + 1, format!("invalid distance '{}'", t)))
            })
            .collect::<Result<Vec<_>, _>>()?;
        cities.push(City::from(city));
        rows.push(row);
    }
    DistanceMatrix::from_rows(cities, rows)
}

/// `pseudo City` lines.
pub fn parse_members(
    file: &str,
    content: &str,
    book: &mut ScenarioBook,
) -> Result<(), DatasetError> {
    for (no, line) in content.lines().enumerate() {
        let parts: Vec<&str> = line.split_whitespace().collect();
        match parts.as_slice() {
            [] => continue,
            [pseudo, city] => book.add_member(*pseudo, *city),
            _ => return Err(parse_error(file, no + 1, "expected 'pseudo city'")),
        }
    }
    Ok(())
}

/// `seller -> buyer` lines. Lines without an arrow are ignored.
pub fn parse_trades(file: &str, content: &str) -> Result<Vec<Trade>, DatasetError> {
    let mut trades = Vec::new();
    for (no, line) in content.lines().enumerate() {
        let Some((seller, buyer)) = line.split_once("->") else {
            continue;
        };
        let (seller, buyer) = (seller.trim(), buyer.trim());
        if seller.is_empty() || buyer.is_empty() {
            return Err(parse_error(file, no + 1, "empty member name"));
        }
        trades.push(Trade::new(seller, buyer));
    }
    Ok(trades)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn book() -> ScenarioBook {
        let mut book = ScenarioBook::new();
        book.add_member("Sacha", "Paris");
        book.add_member("Ondine", "Lyon");
        book.add_member("Pierre", "Lille");
        book
    }

    fn dataset() -> Dataset {
        let distances = parse_distances(
            "distances.txt",
            "Velizy 0 20 470 225\nParis 20 0 465 220\nLyon 470 465 0 690\nLille 225 220 690 0\n",
        )
        .unwrap();
        let mut book = book();
        book.add_scenario(0, vec![Trade::new("Sacha", "Ondine"), Trade::new("Pierre", "Sacha")])
            .unwrap();
        Dataset {
            name: "test".to_string(),
            depot: City::from("Velizy"),
            distances,
            book,
            search: None,
        }
    }

    #[test]
    fn test_sales_resolved_to_cities() {
        let data = dataset();
        let sales = data.book.sales_for_scenario(0).unwrap();
        assert_eq!(sales, vec![Sale::new("Paris", "Lyon"), Sale::new("Lille", "Paris")]);
    }

    #[test]
    fn test_unknown_scenario() {
        let err = dataset().book.sales_for_scenario(4).unwrap_err();
        assert_eq!(err, SolverError::UnknownScenario(4));
    }

    #[test]
    fn test_validation_rules() {
        let book = book();
        assert!(matches!(
            book.validate(1, &[]),
            Err(DatasetError::InvalidScenario { scenario: 1, .. })
        ));
        assert!(matches!(
            book.validate(1, &[Trade::new("Sacha", "Nobody")]),
            Err(DatasetError::UnknownMember(m)) if m == "Nobody"
        ));
        assert!(matches!(
            book.validate(1, &[Trade::new("Sacha", "Sacha")]),
            Err(DatasetError::InvalidScenario { .. })
        ));
        assert!(book.validate(1, &[Trade::new("Sacha", "Pierre")]).is_ok());
    }

    #[test]
    fn test_add_scenario_ids() {
        let mut book = book();
        assert_eq!(book.next_scenario_id(), 0);
        book.add_scenario(3, vec![Trade::new("Sacha", "Pierre")]).unwrap();
        assert_eq!(book.next_scenario_id(), 4);
        assert!(book.add_scenario(4, Vec::new()).is_err());
        assert_eq!(book.scenario_ids(), vec![3]);
    }

    #[test]
    fn test_json_roundtrip_validates() {
        let data = dataset();
        let json = serde_json::to_string(&data).unwrap();
        let back: Dataset = serde_json::from_str(&json).unwrap();
        assert_eq!(back.book.scenario_ids(), vec![0]);
        assert_eq!(back.distances.len(), 4);

        let bad =
            r#"{"members": {"a": "Paris"}, "scenarios": {"0": [{"seller": "a", "buyer": "b"}]}}"#;
        assert!(serde_json::from_str::<ScenarioBook>(bad).is_err());
    }

    #[test]
    fn test_scenario_and_statistics() {
        let data = dataset();
        let scenario = data.scenario(0).unwrap();
        assert_eq!(scenario.depot, City::from("Velizy"));
        assert_eq!(scenario.sales.len(), 2);

        let stats = data.statistics();
        assert_eq!(stats.num_cities, 4);
        assert_eq!(stats.total_sales, 2);
        assert_eq!(stats.max_distance, 690);
        assert!(stats.symmetric);
        assert!(stats.to_string().contains("Scenarios: 1"));
    }

    #[test]
    fn test_validate_unknown_city() {
        let mut data = dataset();
        data.book.add_member("Zoe", "Brest");
        assert!(matches!(
            data.validate(),
            Err(DatasetError::Solver(SolverError::UnknownCity(c))) if c == City::from("Brest")
        ));
    }

    #[test]
    fn test_parse_text_formats() {
        let trades =
            parse_trades("scenario_0.txt", "Sacha -> Ondine\n\nPierre -> Sacha\n").unwrap();
        assert_eq!(trades.len(), 2);
        assert_eq!(trades[1], Trade::new("Pierre", "Sacha"));

        let mut book = ScenarioBook::new();
        assert!(parse_members("membres.txt", "Sacha Paris\nbroken\n", &mut book).is_err());

        let err = parse_distances("distances.txt", "A 0 x\nB 1 0\n").unwrap_err();
        assert!(matches!(err, DatasetError::Parse { line: 1, .. }));
    }

    #[test]
    fn test_resource_dir() {
        let dir = std::env::temp_dir().join(format!("sales-tour-resources-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("distances.txt"),
            "Velizy 0 20 470\nParis 20 0 465\nLyon 470 465 0\n",
        )
        .unwrap();
        fs::write(dir.join("membres_APPLI.txt"), "Sacha Paris\nOndine Lyon\n").unwrap();
        fs::write(dir.join("scenario_0.txt"), "Sacha -> Ondine\n").unwrap();
        fs::write(dir.join("scenario_1_1.txt"), "Ondine -> Sacha\n").unwrap();

        let data = Dataset::from_resource_dir(&dir, "Velizy").unwrap();
        fs::remove_dir_all(&dir).unwrap();

        assert_eq!(data.book.scenario_ids(), vec![0, 1]);
        assert_eq!(
            data.scenario(1).unwrap().sales,
            vec![Sale::new("Lyon", "Paris")]
        );
    }
}
