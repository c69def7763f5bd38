use crate::prim_path;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Reserved property holding the lifecycle status of a prim
pub const STATUS_KEY: &str = "status";
/// Reserved property holding the element classification
pub const ENTITY_TYPE_KEY: &str = "entityType";
/// Reserved property holding the human-readable label
pub const DISPLAY_NAME_KEY: &str = "displayName";
/// `entityType` value marking a lightweight stand-in prim
pub const PLACEHOLDER_ENTITY: &str = "placeholder";
/// Name of the append-only log block
pub const CHANGE_LOG_BLOCK: &str = "ChangeLog";

pub const RESERVED_KEYS: [&str; 3] = [STATUS_KEY, ENTITY_TYPE_KEY, DISPLAY_NAME_KEY];

/// Root document node
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SceneDocument {
    /// Magic header line such as `#usda 1.0`
    pub header: Option<String>,
    pub default_prim: Option<String>,
    /// Layer metadata entries kept verbatim
    pub metadata: Vec<String>,
    pub prims: Vec<Prim>,
    /// Top-level statements outside the supported subset
    pub opaque: Vec<String>,
}

impl SceneDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Find a prim anywhere in the forest by absolute path
    pub fn find_prim(&self, path: &str) -> Option<&Prim> {
        find_prim(&self.prims, path)
    }

    pub fn find_prim_mut(&mut self, path: &str) -> Option<&mut Prim> {
        find_prim_mut(&mut self.prims, path)
    }

    /// The top-level change-log block, if the document has one
    pub fn change_log(&self) -> Option<&Prim> {
        self.prims.iter().find(|p| p.name == CHANGE_LOG_BLOCK)
    }

    /// Scene prims, excluding the change-log block
    pub fn scene_prims(&self) -> impl Iterator<Item = &Prim> {
        self.prims.iter().filter(|p| p.name != CHANGE_LOG_BLOCK)
    }

    /// The prim named by `defaultPrim`, or the first scene prim
    pub fn default_root(&self) -> Option<&Prim> {
        match &self.default_prim {
            Some(name) => self.prims.iter().find(|p| &p.name == name),
            None => self.scene_prims().next(),
        }
    }
}

/// How a prim spec contributes to the composed scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Specifier {
    Def,
    Over,
    Class,
}

impl Specifier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Specifier::Def => "def",
            Specifier::Over => "over",
            Specifier::Class => "class",
        }
    }
}

/// Where a prim was authored before composition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    /// Layer file path (or referenced document) the spec came from
    pub document: String,
    /// Path of the spec inside that document
    pub path: String,
}

/// Scene element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prim {
    pub path: String,
    pub name: String,
    pub specifier: Specifier,
    pub type_name: Option<String>,
    pub properties: Vec<Property>,
    pub children: Vec<Prim>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub arc: Option<CompositionArc>,
    /// Prim metadata entries kept verbatim
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub metadata: Vec<String>,
    /// Body statements outside the supported subset
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub opaque: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<Provenance>,
}

impl Prim {
    pub fn new(parent_path: &str, name: impl Into<String>, specifier: Specifier) -> Self {
        let name = name.into();
        Self {
            path: prim_path::join(parent_path, &name),
            name,
            specifier,
            type_name: None,
            properties: Vec::new(),
            children: Vec::new(),
            arc: None,
            metadata: Vec::new(),
            opaque: Vec::new(),
            source: None,
        }
    }

    pub fn with_type(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: PropertyValue) -> Self {
        self.set_property(name, value);
        self
    }

    pub fn with_child(mut self, mut child: Prim) -> Self {
        child.rebase(&prim_path::join(&self.path, &child.name));
        self.children.push(child);
        self
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn has_property(&self, name: &str) -> bool {
        self.property(name).is_some()
    }

    /// Insert or replace a property, keeping the original position on replace
    pub fn set_property(&mut self, name: impl Into<String>, value: PropertyValue) {
        let name = name.into();
        match self.properties.iter_mut().find(|p| p.name == name) {
            Some(existing) => existing.value = value,
            None => self.properties.push(Property::custom(name, value)),
        }
    }

    pub fn remove_property(&mut self, name: &str) -> Option<Property> {
        let index = self.properties.iter().position(|p| p.name == name)?;
        Some(self.properties.remove(index))
    }

    /// Text value of a string or token property
    pub fn text_property(&self, name: &str) -> Option<&str> {
        self.property(name).and_then(|p| p.value.as_text())
    }

    pub fn status(&self) -> Option<&str> {
        self.text_property(STATUS_KEY)
    }

    pub fn is_placeholder(&self) -> bool {
        self.text_property(ENTITY_TYPE_KEY)
            .map(|t| t.eq_ignore_ascii_case(PLACEHOLDER_ENTITY))
            .unwrap_or(false)
    }

    /// Properties other than the reserved status/classification keys
    pub fn own_properties(&self) -> impl Iterator<Item = &Property> {
        self.properties
            .iter()
            .filter(|p| !RESERVED_KEYS.contains(&p.name.as_str()))
    }

    /// Properties grouped by namespace (`Pset_WallCommon:FireRating` → `Pset_WallCommon`)
    pub fn psets(&self) -> BTreeMap<&str, Vec<&Property>> {
        let mut groups: BTreeMap<&str, Vec<&Property>> = BTreeMap::new();
        for property in &self.properties {
            if let Some((group, _)) = property.name.split_once(':') {
                groups.entry(group).or_default().push(property);
            }
        }
        groups
    }

    pub fn child(&self, name: &str) -> Option<&Prim> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn child_mut(&mut self, name: &str) -> Option<&mut Prim> {
        self.children.iter_mut().find(|c| c.name == name)
    }

    /// Find a prim in this subtree by absolute path
    pub fn find(&self, path: &str) -> Option<&Prim> {
        if self.path == path {
            return Some(self);
        }
        if !prim_path::is_descendant(path, &self.path) {
            return None;
        }
        self.children.iter().find_map(|c| c.find(path))
    }

    pub fn find_mut(&mut self, path: &str) -> Option<&mut Prim> {
        if self.path == path {
            return Some(self);
        }
        if !prim_path::is_descendant(path, &self.path) {
            return None;
        }
        self.children.iter_mut().find_map(|c| c.find_mut(path))
    }

    /// Move this subtree to `new_path`, recomputing every descendant path
    pub fn rebase(&mut self, new_path: &str) {
        self.path = new_path.to_string();
        if let Some(name) = prim_path::name_of(new_path) {
            self.name = name.to_string();
        }
        let parent = self.path.clone();
        for child in &mut self.children {
            let child_path = prim_path::join(&parent, &child.name);
            child.rebase(&child_path);
        }
    }

    /// Depth-first, pre-order iteration over this prim and its descendants
    pub fn descendants(&self) -> Vec<&Prim> {
        let mut out = vec![self];
        for child in &self.children {
            out.extend(child.descendants());
        }
        out
    }

    /// A copy of this prim without its children
    pub fn shallow_clone(&self) -> Prim {
        Prim {
            children: Vec::new(),
            ..self.clone()
        }
    }
}

/// Find a prim in a forest by absolute path
pub fn find_prim<'a>(prims: &'a [Prim], path: &str) -> Option<&'a Prim> {
    prims.iter().find_map(|p| p.find(path))
}

pub fn find_prim_mut<'a>(prims: &'a mut [Prim], path: &str) -> Option<&'a mut Prim> {
    prims.iter_mut().find_map(|p| p.find_mut(path))
}

/// Typed attribute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub value: PropertyValue,
    /// Authored with the `custom` qualifier
    pub custom: bool,
    /// Authored with the `uniform` variability qualifier
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub uniform: bool,
}

impl Property {
    pub fn custom(name: impl Into<String>, value: PropertyValue) -> Self {
        Self {
            name: name.into(),
            value,
            custom: true,
            uniform: false,
        }
    }

    pub fn value_type(&self) -> PropertyType {
        self.value.value_type()
    }
}

/// Supported property value types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    String,
    Token,
    Int,
    Float,
    Double,
    Bool,
}

impl PropertyType {
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        match keyword {
            "string" => Some(PropertyType::String),
            "token" => Some(PropertyType::Token),
            "int" => Some(PropertyType::Int),
            "float" => Some(PropertyType::Float),
            "double" => Some(PropertyType::Double),
            "bool" => Some(PropertyType::Bool),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyType::String => "string",
            PropertyType::Token => "token",
            PropertyType::Int => "int",
            PropertyType::Float => "float",
            PropertyType::Double => "double",
            PropertyType::Bool => "bool",
        }
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PropertyType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PropertyType::from_keyword(s).ok_or_else(|| format!("unsupported property type '{}'", s))
    }
}

/// Typed property value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum PropertyValue {
    String(String),
    Token(String),
    Int(i64),
    Float(f64),
    Double(f64),
    Bool(bool),
}

impl PropertyValue {
    pub fn string(value: impl Into<String>) -> Self {
        PropertyValue::String(value.into())
    }

    pub fn token(value: impl Into<String>) -> Self {
        PropertyValue::Token(value.into())
    }

    pub fn value_type(&self) -> PropertyType {
        match self {
            PropertyValue::String(_) => PropertyType::String,
            PropertyValue::Token(_) => PropertyType::Token,
            PropertyValue::Int(_) => PropertyType::Int,
            PropertyValue::Float(_) => PropertyType::Float,
            PropertyValue::Double(_) => PropertyType::Double,
            PropertyValue::Bool(_) => PropertyType::Bool,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::String(s) | PropertyValue::Token(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(i) => Some(*i),
            _ => None,
        }
    }
}

impl fmt::Display for PropertyValue {
    /// Plain rendering (no quotes), as shown in property panels
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::String(s) | PropertyValue::Token(s) => f.write_str(s),
            PropertyValue::Int(i) => write!(f, "{}", i),
            PropertyValue::Float(v) | PropertyValue::Double(v) => {
                f.write_str(&crate::serializer::format_float(*v))
            }
            PropertyValue::Bool(b) => write!(f, "{}", b),
        }
    }
}

/// Kind of composition arc
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArcKind {
    References,
    Payload,
}

impl ArcKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ArcKind::References => "references",
            ArcKind::Payload => "payload",
        }
    }
}

/// List-edit operator in front of an arc
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ListOp {
    Explicit,
    Prepend,
    Append,
}

/// Reference or payload pointing at a prim in another document
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompositionArc {
    pub kind: ArcKind,
    pub list_op: ListOp,
    /// Referenced document (`./box.usda`)
    pub asset: String,
    /// Referent prim path; `None` targets the document's default prim
    pub target: Option<String>,
}

impl CompositionArc {
    pub fn reference(asset: impl Into<String>, target: Option<String>) -> Self {
        Self {
            kind: ArcKind::References,
            list_op: ListOp::Prepend,
            asset: asset.into(),
            target,
        }
    }

    pub fn payload(asset: impl Into<String>, target: Option<String>) -> Self {
        Self {
            kind: ArcKind::Payload,
            list_op: ListOp::Explicit,
            asset: asset.into(),
            target,
        }
    }
}

impl fmt::Display for CompositionArc {
    /// `@<file>@</path>` form
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "@{}@", self.asset)?;
        if let Some(target) = &self.target {
            write!(f, "<{}>", target)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_with_child_rebases_paths() {
        let box_prim = Prim::new("", "Box", Specifier::Def)
            .with_child(Prim::new("", "Lid", Specifier::Def));
        let world = Prim::new("", "World", Specifier::Def).with_child(box_prim);

        assert_eq!(world.children[0].path, "/World/Box");
        assert_eq!(world.children[0].children[0].path, "/World/Box/Lid");
        assert!(world.find("/World/Box/Lid").is_some());
        assert!(world.find("/Other").is_none());
    }

    #[test]
    fn test_set_property_keeps_order() {
        let mut prim = Prim::new("", "A", Specifier::Def)
            .with_property("status", PropertyValue::string("WIP"))
            .with_property("size", PropertyValue::Double(1.0));

        prim.set_property("status", PropertyValue::string("Shared"));
        assert_eq!(prim.properties[0].name, "status");
        assert_eq!(prim.status(), Some("Shared"));
        assert_eq!(prim.properties.len(), 2);
    }

    #[test]
    fn test_placeholder_classification() {
        let prim = Prim::new("", "A", Specifier::Def)
            .with_property(ENTITY_TYPE_KEY, PropertyValue::string("Placeholder"));
        assert!(prim.is_placeholder());

        let real = Prim::new("", "B", Specifier::Def)
            .with_property(ENTITY_TYPE_KEY, PropertyValue::string("IfcWall"));
        assert!(!real.is_placeholder());
    }

    #[test]
    fn test_psets_group_by_namespace() {
        let prim = Prim::new("", "Wall", Specifier::Def)
            .with_property("Pset_WallCommon:FireRating", PropertyValue::string("EI60"))
            .with_property("Pset_WallCommon:IsExternal", PropertyValue::Bool(true))
            .with_property("status", PropertyValue::string("WIP"));

        let psets = prim.psets();
        assert_eq!(psets.len(), 1);
        assert_eq!(psets["Pset_WallCommon"].len(), 2);
    }

    #[test]
    fn test_arc_display() {
        let arc = CompositionArc::reference("./box.usda", Some("/Box".to_string()));
        assert_eq!(arc.to_string(), "@./box.usda@</Box>");
    }
}
