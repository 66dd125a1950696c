#![warn(missing_docs)]

//! Anti-warping tab placement.
//!
//! Tabs are small support meshes attached to a model in a [`Scene`]. They
//! can be placed one at a time at a picked point, or automatically along a
//! model's footprint with a minimum spacing of half the tab diameter.
//! Placing a tab may adjust a few print settings so the tab actually
//! prints; every adjustment is reported as a [`ProfileNotice`].
//!
//! # Example
//!
//! ```
//! use tabplus_math::Point2;
//! use tabplus_mesh::TriangleMesh;
//! use tabplus_place::{Footprint, MemoryProfile, PlacementEngine, Scene, SceneNode, TabConfig};
//!
//! let mut scene = Scene::new();
//! let hull = Footprint::regular(Point2::new(0.0, 0.0), 20.0, 8);
//! let model = scene.add(SceneNode::model("part", TriangleMesh::new(), hull));
//!
//! let mut profile = MemoryProfile::default();
//! let mut engine = PlacementEngine::new(TabConfig::default());
//! let placed = engine.place_auto(&mut scene, &mut profile).unwrap();
//! assert_eq!(placed, 8);
//! assert_eq!(scene.get(model).unwrap().children().len(), 8);
//! ```

pub mod config;
pub mod error;
pub mod footprint;
pub mod placement;
pub mod prefs;
pub mod profile;
pub mod scene;
pub mod tool;
pub mod value;

pub use config::{NoticeFlags, TabConfig};
pub use error::{PlaceError, Result};
pub use footprint::{spaced_points, Footprint};
pub use placement::{deep_selection, is_eligible, PlacementEngine, ProfileNotice, TAB_NODE_NAME};
pub use prefs::{MemoryPreferences, PreferenceStore, TomlPreferences};
pub use profile::{tab_dimensions, MemoryProfile, PrintProfile, ProfileValues, SettingScope, TabDimensions};
pub use scene::{NodeId, NodeSettings, Scene, SceneEvent, SceneNode, MAX_PENDING_EVENTS};
pub use tool::{MouseButton, Picker, PointerEvent, PointerOutcome, TabTool, ToolProperties};
pub use value::SettingValue;
