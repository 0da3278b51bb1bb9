//! Shared host stand-ins for the integration tests.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, HashSet};

use parking_lot::Mutex;

use dynmorph_core::types::{ArchetypeId, AttributeId, CharacterId, KeywordId, Sex};
use dynmorph_core::{CharacterModel, FormLookup};

pub const STRENGTH: AttributeId = AttributeId(1);
pub const HEAVY_ARMOR: KeywordId = KeywordId(10);

/// Form table with one attribute, one keyword and one archetype.
pub struct Forms;

impl FormLookup for Forms {
    fn attribute(&self, editor_id: &str) -> Option<AttributeId> {
        (editor_id == "AttrStrength").then_some(STRENGTH)
    }

    fn keyword(&self, editor_id: &str) -> Option<KeywordId> {
        (editor_id == "ArmorHeavy").then_some(HEAVY_ARMOR)
    }

    fn archetype_exists(&self, editor_id: &str) -> bool {
        editor_id == "HumanRace"
    }
}

/// A character whose channels live in a sorted map.
pub struct Character {
    pub id: CharacterId,
    pub sex: Sex,
    pub attributes: Mutex<HashMap<AttributeId, f64>>,
    pub worn: Mutex<HashSet<KeywordId>>,
    pub channels: Mutex<BTreeMap<String, f32>>,
    pub refreshes: Mutex<u32>,
}

impl Character {
    pub fn new(sex: Sex) -> Self {
        Self {
            id: CharacterId(0x1000),
            sex,
            attributes: Mutex::new(HashMap::new()),
            worn: Mutex::new(HashSet::new()),
            channels: Mutex::new(BTreeMap::new()),
            refreshes: Mutex::new(0),
        }
    }

    pub fn set_attribute(&self, id: AttributeId, value: f64) {
        self.attributes.lock().insert(id, value);
    }

    pub fn get(&self, name: &str) -> f32 {
        self.channel(name)
    }

    pub fn read_all(&self) -> BTreeMap<String, f32> {
        self.channels.lock().clone()
    }
}

impl CharacterModel for Character {
    fn id(&self) -> CharacterId {
        self.id
    }

    fn archetype_and_sex(&self) -> Option<(ArchetypeId, Sex)> {
        Some((ArchetypeId::new("HumanRace"), self.sex))
    }

    fn attribute(&self, attribute: AttributeId) -> f64 {
        self.attributes.lock().get(&attribute).copied().unwrap_or(0.0)
    }

    fn has_worn_keyword(&self, keyword: KeywordId) -> bool {
        self.worn.lock().contains(&keyword)
    }

    fn has_innate_keyword(&self, _keyword: KeywordId) -> bool {
        false
    }

    fn channel(&self, name: &str) -> f32 {
        self.channels.lock().get(name).copied().unwrap_or(0.0)
    }

    fn read_channels(&self) -> Option<Vec<(String, f32)>> {
        Some(
            self.channels
                .lock()
                .iter()
                .map(|(k, v)| (k.clone(), *v))
                .collect(),
        )
    }

    fn set_channel(&self, name: &str, value: f32) {
        self.channels.lock().insert(name.to_string(), value);
    }

    fn request_visual_refresh(&self) {
        *self.refreshes.lock() += 1;
    }
}
