// ── Platform registry ──
//
// Maps each platform tag to the constructor that turns a device into the
// caller's entity type. Resolved once from the classification tally, so
// platforms without devices (or ignored ones) are never instantiated.

use indexmap::IndexMap;
use tracing::debug;

use crate::model::{Device, Platform};
use crate::project::Project;

type Constructor<E> = Box<dyn Fn(&Device) -> E + Send + Sync>;

/// Tag → entity constructor table.
pub struct PlatformRegistry<E> {
    constructors: IndexMap<Platform, Constructor<E>>,
}

impl<E> Default for PlatformRegistry<E> {
    fn default() -> Self {
        Self {
            constructors: IndexMap::new(),
        }
    }
}

impl<E> PlatformRegistry<E> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the constructor for one platform.
    pub fn register<F>(mut self, platform: Platform, constructor: F) -> Self
    where
        F: Fn(&Device) -> E + Send + Sync + 'static,
    {
        self.constructors.insert(platform, Box::new(constructor));
        self
    }

    /// Instantiate entities for every registered platform that has
    /// devices and is not ignored.
    pub fn build(&self, project: &Project) -> IndexMap<Platform, Vec<E>> {
        let mut entities = IndexMap::new();
        for (platform, constructor) in &self.constructors {
            let Some(count) = project.type_exists(*platform) else {
                continue;
            };
            debug!(%platform, count, "setting up platform");
            let built: Vec<E> = project
                .get_by_type(*platform)
                .values()
                .map(|device| constructor(device.as_ref()))
                .collect();
            entities.insert(*platform, built);
        }
        entities
    }
}
