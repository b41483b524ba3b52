use crate::color::HexColor;
use crate::scene::MeshId;
use std::collections::HashMap;

/// What the user committed for one mesh. Records are replaced wholesale, never merged.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MaterialOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<HexColor>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub texture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tile_scale_x: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tile_scale_y: Option<f32>,
}

impl MaterialOverride {
    pub fn color_only(color: HexColor) -> Self {
        Self {
            color: Some(color),
            ..Self::default()
        }
    }

    pub fn textured(texture: impl Into<String>, scale: [f32; 2]) -> Self {
        Self {
            color: None,
            texture: Some(texture.into()),
            tile_scale_x: Some(scale[0]),
            tile_scale_y: Some(scale[1]),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct OverrideMap {
    records: HashMap<MeshId, MaterialOverride>,
}

impl OverrideMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces any existing record for `id`. Returns true if the stored record changed.
    pub fn set(&mut self, id: MeshId, record: MaterialOverride) -> bool {
        match self.records.insert(id, record.clone()) {
            Some(previous) => previous != record,
            None => true,
        }
    }

    pub fn get(&self, id: MeshId) -> Option<&MaterialOverride> {
        self.records.get(&id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::{MaterialOverride, OverrideMap};
    use crate::color::HexColor;
    use crate::scene::MeshId;

    #[test]
    fn set_replaces_whole_record() {
        let mut map = OverrideMap::new();
        let id = MeshId(1);
        assert!(map.set(id, MaterialOverride::color_only(HexColor::parse("#112233").unwrap())));
        assert!(map.set(id, MaterialOverride::textured("t.png", [2.0, 3.0])));
        let record = map.get(id).unwrap();
        assert_eq!(record.color, None);
        assert_eq!(record.texture.as_deref(), Some("t.png"));
        assert_eq!(record.tile_scale_x, Some(2.0));
        assert_eq!(record.tile_scale_y, Some(3.0));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn setting_identical_record_reports_no_change() {
        let mut map = OverrideMap::new();
        let record = MaterialOverride::textured("t.png", [1.0, 1.0]);
        assert!(map.set(MeshId(0), record.clone()));
        assert!(!map.set(MeshId(0), record));
    }

    #[test]
    fn records_serialize_with_original_field_names() {
        let record = MaterialOverride::textured("tile.jpg", [2.0, 3.0]);
        let json = serde_json::to_string(&record).unwrap();
        assert_eq!(
            json,
            r#"{"texture":"tile.jpg","tileScaleX":2.0,"tileScaleY":3.0}"#
        );
        let color = MaterialOverride::color_only(HexColor::parse("#112233").unwrap());
        assert_eq!(serde_json::to_string(&color).unwrap(), r##"{"color":"#112233"}"##);
    }
}
