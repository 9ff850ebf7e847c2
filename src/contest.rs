use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The categories a registrant may enter. `NONE` means a plain
/// visitor registration.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Contest {
    None,
    SuperMom,
    CutestBaby,
    SeniorCitizen,
    General,
}

impl Default for Contest {
    fn default() -> Self {
        Contest::None
    }
}

/// Whether a contest asks for a particular field.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Requirement {
    Required,
    NotApplicable,
}

/// The fields each contest asks for beyond the common ones.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Requirements {
    pub children: Requirement,
}

/// Public description of a contest.
#[derive(Clone, Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContestInfo {
    pub id: Contest,
    pub title: &'static str,
    pub description: &'static str,
    pub short_description: &'static str,
    pub who_can_join: &'static str,
    pub rules: &'static [&'static str],
    pub eligibility: &'static str,
    pub judging_criteria: &'static str,
    #[serde(rename = "contactWhatsApp")]
    pub contact_whatsapp: &'static str,
    pub sample_image: &'static str,
}

/// The organizers' WhatsApp number, shown with every contest.
pub const CONTACT_WHATSAPP: &str = "+91-8120174075";

#[derive(Debug, Error, PartialEq)]
#[error("unknown contest {0:?}")]
pub struct UnknownContest(pub String);

impl Contest {
    pub const ALL: [Contest; 5] = [
        Contest::None,
        Contest::SuperMom,
        Contest::CutestBaby,
        Contest::SeniorCitizen,
        Contest::General,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Contest::None => "NONE",
            Contest::SuperMom => "SUPERMOM",
            Contest::CutestBaby => "CUTESTBABY",
            Contest::SeniorCitizen => "SENIORCITIZEN",
            Contest::General => "GENERAL",
        }
    }

    pub fn requirements(self) -> Requirements {
        use Requirement::*;

        match self {
            Contest::SuperMom => Requirements { children: Required },
            Contest::None | Contest::CutestBaby | Contest::SeniorCitizen | Contest::General => {
                Requirements {
                    children: NotApplicable,
                }
            }
        }
    }

    pub fn info(self) -> ContestInfo {
        const CARNIVAL: &str =
            "Join our Diwali Family Carnival for a day of fun, food, and festivities!";
        const COURTESY: &[&str] = &["Be respectful to all participants", "Follow event guidelines"];

        let base = ContestInfo {
            id: self,
            title: "",
            description: CARNIVAL,
            short_description: CARNIVAL,
            who_can_join: "Everyone is welcome!",
            rules: COURTESY,
            eligibility: "All ages welcome",
            judging_criteria: "N/A",
            contact_whatsapp: CONTACT_WHATSAPP,
            sample_image: "",
        };

        match self {
            Contest::None => ContestInfo {
                title: "General Registration",
                sample_image: "https://images.unsplash.com/photo-1606092195730-5d7b9af1efc5?w=500&h=300&fit=crop",
                ..base
            },
            Contest::SuperMom => ContestInfo {
                title: "Super Mom",
                description: "Celebrate the amazing mothers in our community! Showcase your talents, \
                              share your story, and compete for the title of Super Mom.",
                short_description: "Celebrate amazing mothers! Showcase talents and compete for the title of Super Mom.",
                who_can_join: "Mothers of age 21-60 year",
                rules: &[
                    "Must be a mother of age 21 to 60 year.",
                    "Submit a short video (max 2 minutes) showcasing your talents or sharing your story",
                    "Include a photo of yourself if possible",
                    "Be present at the event for final judging",
                ],
                eligibility: "Mothers of age 21-60 year",
                judging_criteria: "Judging would be based on Quiz Round, Digital Round of Facebook & Instagram \
                                   views and Ramp Walk or Fashion Show on traditional and spiritual theme.",
                sample_image: "/sm.png",
                ..base
            },
            Contest::CutestBaby => ContestInfo {
                title: "Cutest Baby of Indore",
                description: "Show off your little one's adorable smile! Our cutest baby contest is \
                              perfect for families with children under 12 years.",
                short_description: "Show off your little one's adorable smile! Perfect for babies under 12 years.",
                who_can_join: "Babies and toddlers under 12 years",
                rules: &[
                    "Child must be under 12 years old",
                    "Submit cute photo of your baby",
                    "Include baby's name and age",
                    "Parent/guardian must be present at the event",
                ],
                eligibility: "Children under 12 years",
                judging_criteria: "Decoration and Creativity on the stage based on Traditional and spiritual \
                                   theme Engagement on Facebook and Instagram",
                sample_image: "/cb.jpg",
                ..base
            },
            Contest::SeniorCitizen => ContestInfo {
                title: "Damdar Dada & Dadi Ji",
                description: "Honor our wise and wonderful senior citizens! Share your life experiences, \
                              talents, or wisdom in this special contest.",
                short_description: "Honor our wise senior citizens! Share life experiences, talents, or wisdom.",
                who_can_join: "Senior citizens (60+ years)",
                rules: &[
                    "Must be 60 years or older",
                    "Share a story, talent, or life experience",
                    "Submit a photo and optional short video",
                    "Be present at the event for final presentation",
                ],
                eligibility: "Senior citizens aged 60 and above",
                judging_criteria: "2 minutes stage performance on story telling Life experience, wisdom, \
                                   talent, and community contribution and also a part of judging is based \
                                   on facebook voting on parentsbuddy event page",
                sample_image: "/sc.jpg",
                ..base
            },
            Contest::General => ContestInfo {
                title: "Free Family Carnival",
                sample_image: "/general.webp",
                ..base
            },
        }
    }

    /// The catalogue of every contest, in declaration order.
    pub fn catalogue() -> Vec<ContestInfo> {
        Contest::ALL.iter().map(|c| c.info()).collect()
    }
}

impl fmt::Display for Contest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Contest {
    type Err = UnknownContest;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Contest::ALL
            .iter()
            .copied()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| UnknownContest(s.to_owned()))
    }
}

/// The `contest` parameter of an admin query.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ContestFilter {
    All,
    Only(Contest),
}

impl ContestFilter {
    /// Interprets the raw parameter. Absent, blank and `ALL` mean no filter.
    pub fn parse(raw: Option<&str>) -> Result<Self, UnknownContest> {
        match raw.map(str::trim) {
            None | Some("") | Some("ALL") => Ok(ContestFilter::All),
            Some(other) => other.parse().map(ContestFilter::Only),
        }
    }

    pub fn contest(self) -> Option<Contest> {
        match self {
            ContestFilter::All => None,
            ContestFilter::Only(c) => Some(c),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ContestFilter::All => "ALL",
            ContestFilter::Only(c) => c.as_str(),
        }
    }
}

impl FromStr for ContestFilter {
    type Err = UnknownContest;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ContestFilter::parse(Some(s))
    }
}
