use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};
use url::Url;

use crate::error::Error;

/// Session credentials returned by a successful cloud login.
///
/// The same pair authenticates the account against the vendor MQTT broker.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub user_id: String,
    pub token: SecretString,
}

/// Regional Gree cloud deployments.
///
/// An account only exists on the server it was registered with, so the
/// region has to be chosen by the user.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Display,
    EnumIter,
    EnumString,
    Serialize,
    Deserialize,
)]
pub enum GreeServer {
    #[default]
    #[strum(serialize = "Europe")]
    #[serde(rename = "Europe")]
    Europe,
    #[strum(serialize = "East South Asia")]
    #[serde(rename = "East South Asia")]
    EastSouthAsia,
    #[strum(serialize = "North American")]
    #[serde(rename = "North American")]
    NorthAmerica,
    #[strum(serialize = "South American")]
    #[serde(rename = "South American")]
    SouthAmerica,
    #[strum(serialize = "China Mainland")]
    #[serde(rename = "China Mainland")]
    ChinaMainland,
    #[strum(serialize = "India")]
    #[serde(rename = "India")]
    India,
    #[strum(serialize = "Middle East")]
    #[serde(rename = "Middle East")]
    MiddleEast,
    #[strum(serialize = "Australia")]
    #[serde(rename = "Australia")]
    Australia,
    #[strum(serialize = "Russian server")]
    #[serde(rename = "Russian server")]
    Russia,
}

impl GreeServer {
    /// The base URL of this region's cloud API.
    pub fn url(&self) -> &'static str {
        match self {
            Self::Europe => "https://eugrih.gree.com",
            Self::EastSouthAsia => "https://hkgrih.gree.com",
            Self::NorthAmerica => "https://nagrih.gree.com",
            Self::SouthAmerica => "https://sagrih.gree.com",
            Self::ChinaMainland => "https://grih.gree.com",
            Self::India => "https://ingrih.gree.com",
            Self::MiddleEast => "https://megrih.gree.com",
            Self::Australia => "https://augrih.gree.com",
            Self::Russia => "https://rugrih.gree.com",
        }
    }

    /// Parsed form of [`url`](Self::url).
    pub fn base_url(&self) -> Result<Url, Error> {
        Ok(Url::parse(self.url())?)
    }

    /// Display names of every region, in selection order.
    pub fn names() -> Vec<String> {
        Self::iter().map(|s| s.to_string()).collect()
    }
}
