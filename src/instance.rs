//! Cities, sales, the distance model and the scenario handed to the solvers.
//!
//! The solvers never load anything themselves: they receive a [`Scenario`]
//! (depot + ordered sale list) and something implementing
//! [`DistanceProvider`]. Sale lists come from a [`SaleProvider`].

use crate::error::{DatasetError, Result, SolverError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Identifier of a registered scenario.
pub type ScenarioId = u32;

/// Travelled distance, in the unit of the distance matrix (km in the datasets).
pub type Distance = u64;

/// A city name. Opaque, compared by exact name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct City(String);

impl City {
    pub fn new(name: impl Into<String>) -> Self {
        City(name.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }
}

impl From<&str> for City {
    fn from(name: &str) -> Self {
        City::new(name)
    }
}

impl From<String> for City {
    fn from(name: String) -> Self {
        City(name)
    }
}

impl fmt::Display for City {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A card sale: the card is picked up in `vendor` and must then be
/// delivered to `buyer`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Sale {
    pub vendor: City,
    pub buyer: City,
}

impl Sale {
    pub fn new(vendor: impl Into<City>, buyer: impl Into<City>) -> Self {
        Sale {
            vendor: vendor.into(),
            buyer: buyer.into(),
        }
    }

    /// A sale is only meaningful between two different cities.
    pub fn is_well_formed(&self) -> bool {
        self.vendor != self.buyer
    }
}

impl fmt::Display for Sale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}+ -> {}-", self.vendor, self.buyer)
    }
}

/// Distance lookup between two cities.
pub trait DistanceProvider {
    /// Fails with [`SolverError::UnknownCity`] if either city is absent.
    fn distance(&self, from: &City, to: &City) -> Result<Distance>;
}

/// Sale lookup for a scenario identifier.
pub trait SaleProvider {
    /// Fails with [`SolverError::UnknownScenario`] if `id` is not registered.
    fn sales_for_scenario(&self, id: ScenarioId) -> Result<Vec<Sale>>;
}

impl<T: DistanceProvider + ?Sized> DistanceProvider for &T {
    fn distance(&self, from: &City, to: &City) -> Result<Distance> {
        (**self).distance(from, to)
    }
}

/// Serialized shape of a [`DistanceMatrix`]: the global city ordering and
/// one row per city in that ordering.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MatrixRows {
    pub cities: Vec<City>,
    pub rows: Vec<Vec<Distance>>,
}

/// Dense, possibly asymmetric distance matrix over an ordered city list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "MatrixRows", into = "MatrixRows")]
pub struct DistanceMatrix {
    cities: Vec<City>,
    index: HashMap<City, usize>,
    data: Vec<Distance>,
}

impl DistanceMatrix {
    /// Build a matrix from the global city ordering and its rows.
    ///
    /// Every row must have exactly one entry per city.
    pub fn from_rows(cities: Vec<City>, rows: Vec<Vec<Distance>>) -> Result<Self, DatasetError> {
        let n = cities.len();
        let mut index = HashMap::with_capacity(n);
        for (i, city) in cities.iter().enumerate() {
            if index.insert(city.clone(), i).is_some() {
                return Err(DatasetError::DuplicateCity(city.clone()));
            }
        }

        if rows.len() != n {
            let city = cities
                .get(rows.len())
                .cloned()
                .unwrap_or_else(|| City::new("<extra row>"));
            return Err(DatasetError::MalformedMatrix {
                city,
                found: rows.len(),
                expected: n,
            });
        }

        let mut data = Vec::with_capacity(n * n);
        for (city, row) in cities.iter().zip(rows) {
            if row.len() != n {
                return Err(DatasetError::MalformedMatrix {
                    city: city.clone(),
                    found: row.len(),
                    expected: n,
                });
            }
            data.extend(row);
        }

        Ok(DistanceMatrix { cities, index, data })
    }

    /// Global city ordering.
    pub fn cities(&self) -> &[City] {
        &self.cities
    }

    pub fn len(&self) -> usize {
        self.cities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cities.is_empty()
    }

    pub fn index_of(&self, city: &City) -> Option<usize> {
        self.index.get(city).copied()
    }

    pub fn contains(&self, city: &City) -> bool {
        self.index.contains_key(city)
    }

    /// Distance by row/column index.
    ///
    /// # Panics
    ///
    /// Panics if either index is out of bounds.
    #[inline]
    pub fn get(&self, from: usize, to: usize) -> Distance {
        self.data[from * self.cities.len() + to]
    }

    pub fn row(&self, city: &City) -> Option<&[Distance]> {
        let n = self.cities.len();
        self.index_of(city).map(|i| &self.data[i * n..(i + 1) * n])
    }

    pub fn is_symmetric(&self) -> bool {
        let n = self.cities.len();
        (0..n).all(|i| (i + 1..n).all(|j| self.get(i, j) == self.get(j, i)))
    }
}

impl DistanceProvider for DistanceMatrix {
    fn distance(&self, from: &City, to: &City) -> Result<Distance> {
        let i = self
            .index_of(from)
            .ok_or_else(|| SolverError::UnknownCity(from.clone()))?;
        let j = self
            .index_of(to)
            .ok_or_else(|| SolverError::UnknownCity(to.clone()))?;
        Ok(self.get(i, j))
    }
}

impl TryFrom<MatrixRows> for DistanceMatrix {
    type Error = DatasetError;

    fn try_from(raw: MatrixRows) -> Result<Self, Self::Error> {
        DistanceMatrix::from_rows(raw.cities, raw.rows)
    }
}

impl From<DistanceMatrix> for MatrixRows {
    fn from(matrix: DistanceMatrix) -> Self {
        let n = matrix.cities.len();
        let rows = if n == 0 {
            Vec::new()
        } else {
            matrix.data.chunks(n).map(|r| r.to_vec()).collect()
        };
        MatrixRows {
            cities: matrix.cities,
            rows,
        }
    }
}

/// Everything a solver needs to know about one scenario: its identifier,
/// the depot every tour starts and ends at, and the ordered sale list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scenario {
    pub id: ScenarioId,
    pub depot: City,
    pub sales: Vec<Sale>,
}

impl Scenario {
    pub fn new(id: ScenarioId, depot: impl Into<City>, sales: Vec<Sale>) -> Self {
        Scenario {
            id,
            depot: depot.into(),
            sales,
        }
    }

    /// Fetch the sale list of `id` from `provider`.
    pub fn load(provider: &dyn SaleProvider, id: ScenarioId, depot: City) -> Result<Self> {
        let sales = provider.sales_for_scenario(id)?;
        Ok(Scenario { id, depot, sales })
    }

    /// Sales usable by the solvers, in their original order.
    ///
    /// Sales whose vendor and buyer are the same city are skipped.
    pub fn well_formed_sales(&self) -> Vec<&Sale> {
        self.sales
            .iter()
            .filter(|sale| {
                let ok = sale.is_well_formed();
                if !ok {
                    log::warn!(
                        "scenario {}: skipping sale {} (vendor and buyer are the same city)",
                        self.id,
                        sale
                    );
                }
                ok
            })
            .collect()
    }

    /// Distinct cities involved in the sales, in order of first appearance.
    pub fn cities(&self) -> Vec<&City> {
        let mut cities: Vec<&City> = Vec::new();
        for sale in &self.sales {
            for city in [&sale.vendor, &sale.buyer] {
                if !cities.contains(&city) {
                    cities.push(city);
                }
            }
        }
        cities
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_matrix() -> DistanceMatrix {
        DistanceMatrix::from_rows(
            vec!["Velizy".into(), "Paris".into(), "Lyon".into()],
            vec![vec![0, 20, 470], vec![20, 0, 465], vec![470, 460, 0]],
        )
        .unwrap()
    }

    #[test]
    fn test_distance_lookup() {
        let matrix = small_matrix();
        let paris = City::from("Paris");
        let lyon = City::from("Lyon");

        assert_eq!(matrix.distance(&paris, &lyon).unwrap(), 465);
        assert_eq!(matrix.distance(&lyon, &paris).unwrap(), 460);
        assert!(!matrix.is_symmetric());
    }

    #[test]
    fn test_unknown_city() {
        let matrix = small_matrix();
        let err = matrix
            .distance(&City::from("Paris"), &City::from("Nantes"))
            .unwrap_err();
        assert_eq!(err, SolverError::UnknownCity(City::from("Nantes")));
    }

    #[test]
    fn test_malformed_row_rejected() {
        let err = DistanceMatrix::from_rows(
            vec!["A".into(), "B".into()],
            vec![vec![0, 1], vec![1]],
        )
        .unwrap_err();
        assert!(matches!(err, DatasetError::MalformedMatrix { found: 1, expected: 2, .. }));
    }

    #[test]
    fn test_matrix_json_shape() {
        let matrix = small_matrix();
        let json = serde_json::to_string(&matrix).unwrap();
        let back: DistanceMatrix = serde_json::from_str(&json).unwrap();
        assert_eq!(back.row(&City::from("Lyon")).unwrap(), &[470, 460, 0]);
    }

    #[test]
    fn test_malformed_sales_are_skipped() {
        let scenario = Scenario::new(
            0,
            "Velizy",
            vec![Sale::new("Paris", "Paris"), Sale::new("Paris", "Lyon")],
        );
        let sales = scenario.well_formed_sales();
        assert_eq!(sales.len(), 1);
        assert_eq!(sales[0].buyer, City::from("Lyon"));
        assert_eq!(scenario.cities().len(), 2);
    }
}
