
use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use simple_error::{bail, SimpleError};

lazy_static! {
    /// Matches allele names like "A*01:01", "HLA-DRB1*15:01:01:02" or "C*04:09N"
    static ref ALLELE_REGEX: Regex = Regex::new(r"^(?:HLA-)?(?<gene>[A-Z0-9]+)\*(?<fields>[0-9]+(?::[0-9]+)*)(?<suffix>[A-Z]?)$").unwrap();
}

/// The maximum number of colon-delimited fields in an allele name
pub const MAX_ALLELE_FIELDS: usize = 4;

/// The number of fields that define protein-level identity
const PROTEIN_FIELDS: usize = 2;

/// A named HLA allele at up to four-field resolution.
/// Ordering is by gene, then numerically field by field.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct HlaAllele {
    /// The gene short name; e.g. "A"
    gene: String,
    /// The assigned fields; e.g. ["01", "01", "01"] is a three field allele
    fields: Vec<String>,
    /// Optional expression suffix; e.g. 'N' for null alleles
    suffix: Option<char>
}

impl HlaAllele {
    /// Parses an allele name and performs some checks along the way
    /// # Arguments
    /// * `name` - the allele name, should be of form "A*01:01:01:01"; a leading "HLA-" is allowed
    /// # Errors
    /// * if the name does not have the "gene*fields" structure
    /// * if more than four fields are provided
    pub fn new(name: &str) -> Result<HlaAllele, SimpleError> {
        let captures = match ALLELE_REGEX.captures(name) {
            Some(c) => c,
            None => bail!("Unexpected format for allele name: {name}")
        };

        let gene = captures["gene"].to_string();
        let fields: Vec<String> = captures["fields"].split(':').map(String::from).collect();
        if fields.len() > MAX_ALLELE_FIELDS {
            bail!("Unexpected number of fields for allele name: {name}");
        }
        let suffix = captures["suffix"].chars().next();

        Ok(HlaAllele {
            gene,
            fields,
            suffix
        })
    }

    pub fn gene(&self) -> &str {
        &self.gene
    }

    /// The full gene name; e.g. "HLA-A"
    pub fn gene_name(&self) -> String {
        format!("HLA-{}", self.gene)
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    /// Reduces the allele to protein-level identity, which is the first two fields without any suffix
    pub fn as_four_digit(&self) -> HlaAllele {
        HlaAllele {
            gene: self.gene.clone(),
            fields: self.fields.iter().take(PROTEIN_FIELDS).cloned().collect(),
            suffix: None
        }
    }
}

impl std::fmt::Display for HlaAllele {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}*{}", self.gene, self.fields.join(":"))?;
        if let Some(s) = self.suffix {
            write!(f, "{s}")?;
        }
        Ok(())
    }
}

impl Ord for HlaAllele {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // fields are all digits, the string compare only breaks ties like "01" and "1"
        let self_fields = self.fields.iter().map(|f| (f.parse::<u64>().ok(), f));
        let other_fields = other.fields.iter().map(|f| (f.parse::<u64>().ok(), f));
        self.gene.cmp(&other.gene)
            .then_with(|| self_fields.cmp(other_fields))
            .then_with(|| self.suffix.cmp(&other.suffix))
    }
}

impl PartialOrd for HlaAllele {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl TryFrom<String> for HlaAllele {
    type Error = SimpleError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        HlaAllele::new(&value)
    }
}

impl From<HlaAllele> for String {
    fn from(value: HlaAllele) -> Self {
        value.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use std::collections::BTreeSet;

    #[test]
    fn test_good_allele() {
        let allele = HlaAllele::new("A*01:01:01:01").unwrap();
        assert_eq!(allele.gene(), "A");
        assert_eq!(allele.gene_name(), "HLA-A");
        assert_eq!(allele.fields(), &vec!["01".to_string(); 4]);
        assert_eq!(allele.to_string(), "A*01:01:01:01");

        let allele = HlaAllele::new("HLA-DRB1*15:01").unwrap();
        assert_eq!(allele.gene_name(), "HLA-DRB1");
        assert_eq!(allele.to_string(), "DRB1*15:01");
    }

    #[test]
    fn test_bad_alleles() {
        // too many fields
        assert!(HlaAllele::new("A*01:01:01:01:01").is_err());
        // missing star
        assert!(HlaAllele::new("A01:01").is_err());
        // empty field
        assert!(HlaAllele::new("A*01::01").is_err());
        assert!(HlaAllele::new("").is_err());
    }

    #[test]
    fn test_four_digit() {
        let allele = HlaAllele::new("C*04:09:01N").unwrap();
        assert_eq!(allele.to_string(), "C*04:09:01N");
        assert_eq!(allele.as_four_digit().to_string(), "C*04:09");
        assert_eq!(allele.as_four_digit(), HlaAllele::new("C*04:09").unwrap());

        // already short
        let allele = HlaAllele::new("B*07").unwrap();
        assert_eq!(allele.as_four_digit(), allele);
    }

    #[test]
    fn test_ordering() {
        let a1 = HlaAllele::new("A*01:01").unwrap();
        let a2 = HlaAllele::new("A*02:01").unwrap();
        let b1 = HlaAllele::new("B*01:01").unwrap();
        assert!(a1 < a2);
        assert!(a2 < b1);

        // three digit fields sort after two digit ones
        let a11 = HlaAllele::new("A*02:11").unwrap();
        let a101 = HlaAllele::new("A*02:101").unwrap();
        assert!(a11 < a101);
        assert!(a101 < b1);

        // shorter names sort first, then suffixes
        let a11_full = HlaAllele::new("A*02:11:01").unwrap();
        let a11_null = HlaAllele::new("A*02:11N").unwrap();
        assert!(a11 < a11_full);
        assert!(a11 < a11_null);
        assert!(a11_null < a11_full);

        let sorted: Vec<String> = BTreeSet::from([a101.clone(), a2.clone(), a11.clone()]).into_iter()
            .map(|a| a.to_string())
            .collect();
        assert_eq!(sorted, vec!["A*02:01", "A*02:11", "A*02:101"]);
    }

    #[test]
    fn test_serde() {
        let allele: HlaAllele = serde_json::from_str("\"B*07:02:01\"").unwrap();
        assert_eq!(allele.to_string(), "B*07:02:01");
        assert_eq!(serde_json::to_string(&allele).unwrap(), "\"B*07:02:01\"");
        assert!(serde_json::from_str::<HlaAllele>("\"bad\"").is_err());
    }
}
