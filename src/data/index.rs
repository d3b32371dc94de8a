use std::collections::HashMap;
use std::fmt;

use lazy_static::lazy_static;
use regex::Regex;

use crate::data;
use crate::models::PollingCenter;

lazy_static! {
    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();
    static ref NON_SLUG: Regex = Regex::new(r"[^a-z0-9-]").unwrap();

    /// Flattened view of the electoral hierarchy, built once.
    pub static ref INDEX: ElectoralIndex = ElectoralIndex::build();
}

/// Key of one constituency's document in the shared result store. Derived
/// from the (region, district, constituency) names; the derivation must stay
/// byte-for-byte stable or existing stored documents become unreachable.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocationId(String);

impl LocationId {
    pub fn derive(region: &str, district: &str, constituency: &str) -> Self {
        let joined = format!("{}-{}-{}", region, district, constituency).to_lowercase();
        let dashed = WHITESPACE_RUN.replace_all(&joined, "-");
        Self(NON_SLUG.replace_all(&dashed, "").into_owned())
    }

    /// Wraps a key read back from the store without re-deriving it.
    pub fn from_raw(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for LocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone)]
pub struct ConstituencyEntry {
    pub region: String,
    pub district: String,
    pub constituency: String,
    pub id: LocationId,
    pub centers: Vec<PollingCenter>,
    pub registered_voters: u64,
}

/// A polling center with its full containment path, used by the search
/// feature.
#[derive(Debug, Clone)]
pub struct FlatPollingCenter {
    pub code: String,
    pub name: String,
    pub region: String,
    pub district: String,
    pub constituency: String,
}

pub struct ElectoralIndex {
    constituencies: Vec<ConstituencyEntry>,
    centers: Vec<FlatPollingCenter>,
    by_id: HashMap<LocationId, usize>,
}

impl ElectoralIndex {
    fn build() -> Self {
        let mut constituencies = Vec::new();
        let mut centers = Vec::new();

        for (region, districts) in data::regions() {
            for (district, constituency_map) in districts {
                for (constituency, pcs) in constituency_map {
                    let registered_voters =
                        pcs.iter().map(|pc| data::voter_count(&pc.code)).sum();
                    for pc in pcs {
                        centers.push(FlatPollingCenter {
                            code: pc.code.clone(),
                            name: pc.name.clone(),
                            region: region.clone(),
                            district: district.clone(),
                            constituency: constituency.clone(),
                        });
                    }
                    constituencies.push(ConstituencyEntry {
                        region: region.clone(),
                        district: district.clone(),
                        constituency: constituency.clone(),
                        id: LocationId::derive(region, district, constituency),
                        centers: pcs.clone(),
                        registered_voters,
                    });
                }
            }
        }

        let by_id = constituencies
            .iter()
            .enumerate()
            .map(|(i, entry)| (entry.id.clone(), i))
            .collect();

        Self {
            constituencies,
            centers,
            by_id,
        }
    }

    pub fn constituencies(&self) -> &[ConstituencyEntry] {
        &self.constituencies
    }

    pub fn polling_centers(&self) -> &[FlatPollingCenter] {
        &self.centers
    }

    pub fn constituency(&self, id: &LocationId) -> Option<&ConstituencyEntry> {
        self.by_id.get(id).map(|&i| &self.constituencies[i])
    }

    pub fn registered_voters_for(&self, id: &LocationId) -> u64 {
        self.constituency(id)
            .map(|entry| entry.registered_voters)
            .unwrap_or(0)
    }

    pub fn registered_voters_in_district(&self, region: &str, district: &str) -> u64 {
        self.constituencies
            .iter()
            .filter(|entry| entry.region == region && entry.district == district)
            .map(|entry| entry.registered_voters)
            .sum()
    }

    pub fn registered_voters_national(&self) -> u64 {
        self.constituencies
            .iter()
            .map(|entry| entry.registered_voters)
            .sum()
    }

    /// Case-insensitive lookup of a canonical region name.
    pub fn resolve_region(&self, name: &str) -> Option<&str> {
        data::regions()
            .keys()
            .find(|r| r.eq_ignore_ascii_case(name))
            .map(String::as_str)
    }

    pub fn resolve_district(&self, region: &str, name: &str) -> Option<&str> {
        data::regions()
            .get(region)?
            .keys()
            .find(|d| d.eq_ignore_ascii_case(name))
            .map(String::as_str)
    }

    pub fn resolve_constituency(
        &self,
        region: &str,
        district: &str,
        name: &str,
    ) -> Option<&str> {
        data::regions()
            .get(region)?
            .get(district)?
            .keys()
            .find(|c| c.eq_ignore_ascii_case(name))
            .map(String::as_str)
    }

    pub fn region_names(&self) -> Vec<&str> {
        data::regions().keys().map(String::as_str).collect()
    }

    pub fn district_names(&self, region: &str) -> Vec<&str> {
        data::regions()
            .get(region)
            .map(|d| d.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn constituency_names(&self, region: &str, district: &str) -> Vec<&str> {
        data::regions()
            .get(region)
            .and_then(|d| d.get(district))
            .map(|c| c.keys().map(String::as_str).collect())
            .unwrap_or_default()
    }
}
