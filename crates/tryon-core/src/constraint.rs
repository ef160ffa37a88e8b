//! The fixed constraint checklist the evaluator applies to every attempt.

use serde::{Deserialize, Serialize};

/// One correctness check on a generated try-on image.
///
/// The set and its ordering are fixed for a whole run so feedback stays
/// comparable between iterations. Ordering is hierarchical: an identity
/// failure makes later garment checks moot, so the earliest failing
/// constraint leads the revision feedback. All constraints are still
/// evaluated and reported on every attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Constraint {
    /// Person's identity, face and body are unchanged.
    IdentityPreserved,
    /// Pose and framing match the input photo.
    PosePreserved,
    /// The previous garment is fully replaced, no remnants blended in.
    GarmentReplaced,
    /// Garment type, length and layering match the reference garment.
    GarmentStructure,
    /// Color, pattern and material match; fabric is not etched onto skin.
    TextureFidelity,
    /// The garment drapes naturally instead of reading as a flat texture map.
    FitRealism,
    /// Background and unrelated regions (shoes, trousers when trying a top)
    /// are untouched, with no color bleeding.
    SceneUntouched,
}

impl Constraint {
    /// Every constraint, in hierarchical evaluation order.
    pub const ALL: [Constraint; 7] = [
        Constraint::IdentityPreserved,
        Constraint::PosePreserved,
        Constraint::GarmentReplaced,
        Constraint::GarmentStructure,
        Constraint::TextureFidelity,
        Constraint::FitRealism,
        Constraint::SceneUntouched,
    ];

    /// Snake-case wire name, matching the serde representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Constraint::IdentityPreserved => "identity_preserved",
            Constraint::PosePreserved => "pose_preserved",
            Constraint::GarmentReplaced => "garment_replaced",
            Constraint::GarmentStructure => "garment_structure",
            Constraint::TextureFidelity => "texture_fidelity",
            Constraint::FitRealism => "fit_realism",
            Constraint::SceneUntouched => "scene_untouched",
        }
    }

    /// Corrective clause used when composing a revised instruction.
    pub fn correction(&self) -> &'static str {
        match self {
            Constraint::IdentityPreserved => "keep the person's identity, face and body exactly as in the original photo",
            Constraint::PosePreserved => "keep the person's pose and framing unchanged",
            Constraint::GarmentReplaced => "completely remove the original garment before adding the new one, leaving no remnants",
            Constraint::GarmentStructure => "match the reference garment's type, length and layering, worn logically over or under existing clothes",
            Constraint::TextureFidelity => "reproduce the reference garment's exact color, pattern and material as real fabric",
            Constraint::FitRealism => "make the garment drape naturally on the body",
            Constraint::SceneUntouched => "leave the background and all unrelated clothing untouched",
        }
    }
}

impl std::fmt::Display for Constraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
