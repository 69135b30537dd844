use crate::bytecode::annotation::AnnotationNode;
use crate::bytecode::method::MethodNode;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClassNode {
    /// Internal name, e.g. `com/example/mixin/PlayerMixin`.
    pub name: String,
    #[serde(default)]
    pub access: u16,
    #[serde(default)]
    pub super_name: Option<String>,
    #[serde(default)]
    pub visible_annotations: Vec<AnnotationNode>,
    #[serde(default)]
    pub invisible_annotations: Vec<AnnotationNode>,
    #[serde(default)]
    pub methods: Vec<MethodNode>,
}

impl ClassNode {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn method(&self, name: &str, desc: &str) -> Option<&MethodNode> {
        self.methods
            .iter()
            .find(|method| method.name == name && method.desc == desc)
    }

    pub fn method_mut(&mut self, name: &str, desc: &str) -> Option<&mut MethodNode> {
        self.methods
            .iter_mut()
            .find(|method| method.name == name && method.desc == desc)
    }
}

/// Source of class structures. Lookups report absence with `None`.
pub trait ClassProvider {
    fn class(&self, name: &str) -> Option<&ClassNode>;

    fn find_method(&self, owner: &str, name: &str, desc: &str) -> Option<&MethodNode> {
        self.class(owner).and_then(|class| class.method(name, desc))
    }
}

/// In-memory set of classes, typically decoded from JSON.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ClassSet {
    #[serde(default)]
    pub classes: Vec<ClassNode>,
}

impl ClassSet {
    pub fn new(classes: Vec<ClassNode>) -> Self {
        Self { classes }
    }

    pub fn from_json(input: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(input)
    }

    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn class_mut(&mut self, name: &str) -> Option<&mut ClassNode> {
        self.classes.iter_mut().find(|class| class.name == name)
    }

    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.classes.iter().map(|class| class.name.as_str())
    }
}

impl ClassProvider for ClassSet {
    fn class(&self, name: &str) -> Option<&ClassNode> {
        self.classes.iter().find(|class| class.name == name)
    }
}
