//! Bridge module — maps host actors and forms onto the core traits.
//!
//! The host keeps a character's morph state in two places:
//! - three fixed weight slots (`Overweight`, `Strong`, `Thin`)
//! - an open-ended shape-blend map keyed by channel name
//!
//! [`Actor`] presents both as one flat channel namespace to the engine and
//! routes writes back to the right place. [`FormDatabase`] answers editor-ID
//! lookups, and [`ActorWorld`] is the liveness check between a
//! [`CharacterId`] and the live object.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use dashmap::DashMap;
use dynmorph_core::types::{ArchetypeId, AttributeId, CharacterId, KeywordId, Sex, WeightChannel};
use dynmorph_core::{CharacterModel, FormLookup};
use parking_lot::RwLock;

// ---------------------------------------------------------------------------
// Model Data
// ---------------------------------------------------------------------------

/// Morph state of one character model.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NpcData {
    /// `Overweight` slot.
    pub fat: f32,
    /// `Strong` slot.
    pub muscular: f32,
    /// `Thin` slot.
    pub thin: f32,
    /// Every other channel.
    pub shape_blends: BTreeMap<String, f32>,
}

impl NpcData {
    fn slot(&mut self, weight: WeightChannel) -> &mut f32 {
        match weight {
            WeightChannel::Overweight => &mut self.fat,
            WeightChannel::Strong => &mut self.muscular,
            WeightChannel::Thin => &mut self.thin,
        }
    }

    /// Value of a channel; `0.0` when absent.
    #[must_use]
    pub fn get(&self, name: &str) -> f32 {
        match WeightChannel::from_name(name) {
            Some(WeightChannel::Overweight) => self.fat,
            Some(WeightChannel::Strong) => self.muscular,
            Some(WeightChannel::Thin) => self.thin,
            None => self.shape_blends.get(name).copied().unwrap_or(0.0),
        }
    }

    /// Write a channel, creating a shape blend if needed.
    pub fn set(&mut self, name: &str, value: f32) {
        match WeightChannel::from_name(name) {
            Some(weight) => *self.slot(weight) = value,
            None => {
                self.shape_blends.insert(name.to_string(), value);
            }
        }
    }

    /// Weight slots first, then shape blends in name order.
    #[must_use]
    pub fn channels(&self) -> Vec<(String, f32)> {
        WeightChannel::ALL
            .into_iter()
            .map(|w| (w.name().to_string(), self.get(w.name())))
            .chain(self.shape_blends.iter().map(|(k, v)| (k.clone(), *v)))
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Actor
// ---------------------------------------------------------------------------

/// A live character.
pub struct Actor {
    id: CharacterId,
    archetype: ArchetypeId,
    sex: Sex,
    /// `None` until the host has built the model.
    npc: RwLock<Option<NpcData>>,
    attributes: RwLock<HashMap<AttributeId, f64>>,
    worn: RwLock<Vec<KeywordId>>,
    innate: RwLock<HashSet<KeywordId>>,
    refreshes: AtomicU32,
}

impl Actor {
    /// Actor with empty model data.
    #[must_use]
    pub fn new(id: CharacterId, archetype: ArchetypeId, sex: Sex) -> Self {
        Self {
            id,
            archetype,
            sex,
            npc: RwLock::new(Some(NpcData::default())),
            attributes: RwLock::new(HashMap::new()),
            worn: RwLock::new(Vec::new()),
            innate: RwLock::new(HashSet::new()),
            refreshes: AtomicU32::new(0),
        }
    }

    /// Replace (or remove) the model data.
    pub fn set_npc_data(&self, data: Option<NpcData>) {
        *self.npc.write() = data;
    }

    /// Copy of the model data.
    #[must_use]
    pub fn npc_data(&self) -> Option<NpcData> {
        self.npc.read().clone()
    }

    /// Set an attribute value.
    pub fn set_attribute(&self, attribute: AttributeId, value: f64) {
        self.attributes.write().insert(attribute, value);
    }

    /// Equip an item carrying `keywords`.
    pub fn equip(&self, keywords: &[KeywordId]) {
        self.worn.write().extend_from_slice(keywords);
    }

    /// Remove an item carrying `keywords` (one instance of each).
    pub fn unequip(&self, keywords: &[KeywordId]) {
        let mut worn = self.worn.write();
        for kw in keywords {
            if let Some(pos) = worn.iter().position(|w| w == kw) {
                worn.swap_remove(pos);
            }
        }
    }

    /// Give the character record a keyword.
    pub fn add_innate_keyword(&self, keyword: KeywordId) {
        self.innate.write().insert(keyword);
    }

    /// Visual refreshes requested so far.
    #[must_use]
    pub fn refresh_count(&self) -> u32 {
        self.refreshes.load(Ordering::Relaxed)
    }
}

impl CharacterModel for Actor {
    fn id(&self) -> CharacterId {
        self.id
    }

    fn archetype_and_sex(&self) -> Option<(ArchetypeId, Sex)> {
        self.npc
            .read()
            .as_ref()
            .map(|_| (self.archetype.clone(), self.sex))
    }

    fn attribute(&self, attribute: AttributeId) -> f64 {
        self.attributes.read().get(&attribute).copied().unwrap_or(0.0)
    }

    fn has_worn_keyword(&self, keyword: KeywordId) -> bool {
        self.worn.read().contains(&keyword)
    }

    fn has_innate_keyword(&self, keyword: KeywordId) -> bool {
        self.innate.read().contains(&keyword)
    }

    fn worn_keywords(&self) -> Vec<KeywordId> {
        let mut seen = HashSet::new();
        self.worn
            .read()
            .iter()
            .copied()
            .filter(|kw| seen.insert(*kw))
            .collect()
    }

    fn channel(&self, name: &str) -> f32 {
        self.npc.read().as_ref().map_or(0.0, |npc| npc.get(name))
    }

    fn read_channels(&self) -> Option<Vec<(String, f32)>> {
        self.npc.read().as_ref().map(NpcData::channels)
    }

    fn set_channel(&self, name: &str, value: f32) {
        if let Some(npc) = self.npc.write().as_mut() {
            npc.set(name, value);
        }
    }

    fn write_channels(&self, batch: &[(String, f32)]) {
        if let Some(npc) = self.npc.write().as_mut() {
            for (name, value) in batch {
                npc.set(name, *value);
            }
        }
    }

    fn request_visual_refresh(&self) {
        self.refreshes.fetch_add(1, Ordering::Relaxed);
    }
}

// ---------------------------------------------------------------------------
// Form Database
// ---------------------------------------------------------------------------

/// Editor-ID tables of the loaded game data.
#[derive(Debug, Default)]
pub struct FormDatabase {
    attributes: HashMap<String, AttributeId>,
    keywords: HashMap<String, KeywordId>,
    keyword_names: HashMap<KeywordId, String>,
    keyword_scripts: HashMap<KeywordId, String>,
    archetypes: HashSet<String>,
}

impl FormDatabase {
    /// Empty database.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an actor value.
    #[must_use]
    pub fn with_attribute(mut self, editor_id: &str, id: AttributeId) -> Self {
        self.attributes.insert(editor_id.to_string(), id);
        self
    }

    /// Register a keyword.
    #[must_use]
    pub fn with_keyword(mut self, editor_id: &str, id: KeywordId) -> Self {
        self.keywords.insert(editor_id.to_string(), id);
        self.keyword_names.insert(id, editor_id.to_string());
        self
    }

    /// Register a keyword carrying a morph script.
    #[must_use]
    pub fn with_morph_keyword(mut self, editor_id: &str, id: KeywordId, script: &str) -> Self {
        self.keyword_scripts.insert(id, script.to_string());
        self.with_keyword(editor_id, id)
    }

    /// Register an archetype.
    #[must_use]
    pub fn with_archetype(mut self, editor_id: &str) -> Self {
        self.archetypes.insert(editor_id.to_string());
        self
    }
}

impl FormLookup for FormDatabase {
    fn attribute(&self, editor_id: &str) -> Option<AttributeId> {
        self.attributes.get(editor_id).copied()
    }

    fn keyword(&self, editor_id: &str) -> Option<KeywordId> {
        self.keywords.get(editor_id).copied()
    }

    fn archetype_exists(&self, editor_id: &str) -> bool {
        self.archetypes.contains(editor_id)
    }

    fn keyword_editor_id(&self, keyword: KeywordId) -> Option<String> {
        self.keyword_names.get(&keyword).cloned()
    }

    fn keyword_script(&self, keyword: KeywordId) -> Option<String> {
        self.keyword_scripts.get(&keyword).cloned()
    }
}

// ---------------------------------------------------------------------------
// Actor World
// ---------------------------------------------------------------------------

/// Live actors by ID.
#[derive(Default)]
pub struct ActorWorld {
    actors: DashMap<CharacterId, Arc<Actor>>,
}

impl ActorWorld {
    /// Empty world.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an actor, replacing any previous actor with the same ID.
    pub fn spawn(&self, actor: Actor) -> Arc<Actor> {
        let actor = Arc::new(actor);
        self.actors.insert(actor.id(), Arc::clone(&actor));
        actor
    }

    /// Remove an actor.
    pub fn despawn(&self, id: CharacterId) -> Option<Arc<Actor>> {
        self.actors.remove(&id).map(|(_, actor)| actor)
    }

    /// The live actor behind `id`, if it still exists.
    #[must_use]
    pub fn get(&self, id: CharacterId) -> Option<Arc<Actor>> {
        self.actors.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Number of live actors.
    #[must_use]
    pub fn len(&self) -> usize {
        self.actors.len()
    }

    /// Whether no actor is loaded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.actors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn actor() -> Actor {
        Actor::new(CharacterId(0x50), ArchetypeId::new("HumanRace"), Sex::Female)
    }

    #[test]
    fn weight_slots_and_blends_share_one_namespace() {
        let actor = actor();
        actor.write_channels(&[("Thin".to_string(), 0.4), ("Breasts".to_string(), 0.2)]);
        let npc = actor.npc_data().expect("model");
        assert!((npc.thin - 0.4).abs() < f32::EPSILON);
        assert!((npc.shape_blends["Breasts"] - 0.2).abs() < f32::EPSILON);

        let names: Vec<String> = actor
            .read_channels()
            .expect("channels")
            .into_iter()
            .map(|(n, _)| n)
            .collect();
        assert_eq!(names, vec!["Overweight", "Strong", "Thin", "Breasts"]);
    }

    #[test]
    fn missing_model_data_reads_nothing() {
        let actor = actor();
        actor.set_npc_data(None);
        assert!(actor.read_channels().is_none());
        assert!(actor.archetype_and_sex().is_none());
        actor.set_channel("Thin", 1.0);
        assert!(actor.channel("Thin").abs() < f32::EPSILON);
    }

    #[test]
    fn equipment_keywords() {
        let actor = actor();
        actor.equip(&[KeywordId(1), KeywordId(2)]);
        actor.equip(&[KeywordId(1)]);
        assert_eq!(actor.worn_keywords().len(), 2);

        actor.unequip(&[KeywordId(1)]);
        assert!(actor.has_worn_keyword(KeywordId(1)));
        actor.unequip(&[KeywordId(1)]);
        assert!(!actor.has_worn_keyword(KeywordId(1)));
    }

    #[test]
    fn form_database_lookups() {
        let forms = FormDatabase::new()
            .with_attribute("AttrStrength", AttributeId(1))
            .with_morph_keyword("ECArmorMorph_Bulky", KeywordId(9), "Overweight --add 0.5")
            .with_archetype("HumanRace");
        assert_eq!(forms.attribute("AttrStrength"), Some(AttributeId(1)));
        assert_eq!(forms.keyword("ECArmorMorph_Bulky"), Some(KeywordId(9)));
        assert_eq!(forms.keyword_editor_id(KeywordId(9)).as_deref(), Some("ECArmorMorph_Bulky"));
        assert!(forms.keyword_script(KeywordId(9)).is_some());
        assert!(forms.archetype_exists("HumanRace"));
        assert!(!forms.archetype_exists("ElfRace"));
    }

    #[test]
    fn world_liveness() {
        let world = ActorWorld::new();
        let id = world.spawn(actor()).id();
        assert!(world.get(id).is_some());
        assert!(world.despawn(id).is_some());
        assert!(world.get(id).is_none());
        assert!(world.is_empty());
    }
}
