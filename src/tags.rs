//! The tag vocabulary of a WD tagger.
//!
//! `selected_tags.csv` lists one label per model output, in output order. Only
//! the name and category columns matter for captioning.

use crate::{
    error::{Result, TaggerError},
    file::ModelHub,
};
use serde::Deserialize;
use std::{io::Read, path::Path};

/// One CSV record; the `tag_id` and `count` columns are ignored.
#[derive(Debug, Deserialize, Clone)]
pub struct Tag {
    name: String,
    category: u8,
}

/// Tag category as encoded in the `category` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagCategory {
    General,
    Character,
    Rating,
    /// Artist, copyright, meta and anything else; never captioned.
    Other(u8),
}

impl TagCategory {
    pub fn from_code(code: u8) -> Self {
        match code {
            0 => Self::General,
            4 => Self::Character,
            9 => Self::Rating,
            other => Self::Other(other),
        }
    }
}

impl Tag {
    pub fn category(&self) -> TagCategory {
        TagCategory::from_code(self.category)
    }
}

/// Label names plus the output indices belonging to each captioned category.
#[derive(Debug, Clone)]
pub struct LabelTags {
    names: Vec<String>,
    rating: Vec<usize>,
    general: Vec<usize>,
    character: Vec<usize>,
}

impl LabelTags {
    /// Load from the local CSV file
    pub fn load<P: AsRef<Path>>(csv_path: P) -> Result<Self> {
        let reader = csv::Reader::from_path(csv_path.as_ref())?;
        Self::from_csv(reader)
    }

    /// Load from any CSV source with a header row.
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        Self::from_csv(csv::Reader::from_reader(reader))
    }

    fn from_csv<R: Read>(mut reader: csv::Reader<R>) -> Result<Self> {
        let mut names = Vec::new();
        let mut rating = Vec::new();
        let mut general = Vec::new();
        let mut character = Vec::new();

        for (idx, record) in reader.deserialize::<Tag>().enumerate() {
            let tag = record?;
            match tag.category() {
                TagCategory::Rating => rating.push(idx),
                TagCategory::General => general.push(idx),
                TagCategory::Character => character.push(idx),
                _ => {}
            }
            names.push(tag.name);
        }

        if names.is_empty() {
            return Err(TaggerError::Labels("tag file has no records".to_string()));
        }

        Ok(Self {
            names,
            rating,
            general,
            character,
        })
    }

    pub async fn from_pretrained(hub: &ModelHub, repo_id: &str) -> Result<Self> {
        let csv_path = hub.tags_file(repo_id).await?;
        Self::load(csv_path)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn rating(&self) -> &[usize] {
        &self.rating
    }

    pub fn general(&self) -> &[usize] {
        &self.general
    }

    pub fn character(&self) -> &[usize] {
        &self.character
    }
}

#[rustfmt::skip]
pub const UNDERSCORE_TAGS: [&str; 19] = [
    ">_<",
    ">_o",
    "0_0",
    "o_o",
    "3_3",
    "6_9",
    "@_@",
    "u_u",
    "x_x",
    "^_^",
    "|_|",
    "=_=",
    "+_+",
    "+_-",
    "._.",
    "<o>_<o>",
    "<|>_<|>",
    "||_||",
    "(o)_(o)",
];

/// Replaces underscores with spaces, leaving kaomoji intact.
pub fn fix_tag_underscore(tag: &str) -> String {
    if UNDERSCORE_TAGS.contains(&tag) {
        tag.to_string()
    } else {
        tag.replace('_', " ")
    }
}
