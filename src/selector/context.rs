use crate::selector::kind::AnnotationKind;

/// Where the matched injection point annotation lives inside the method
/// annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InjectionPointPath {
    /// `at = @At(...)`
    At,
    /// `slice = @Slice(from = @At(...))`
    SliceFrom,
}

impl InjectionPointPath {
    pub fn keys(self) -> &'static [&'static str] {
        match self {
            InjectionPointPath::At => &["at"],
            InjectionPointPath::SliceFrom => &["slice", "from"],
        }
    }
}

/// Class annotation value that selected the class (`value` or `targets`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassAnnotationRef {
    /// Whether the annotation sits in the visible or invisible table.
    pub visible: bool,
    pub index: usize,
    pub key: String,
}

/// Per-method state gathered while matching, consumed by transforms.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MatchContext {
    method_annotation: Option<AnnotationKind>,
    injection_point: Option<InjectionPointPath>,
    class_annotation: Option<ClassAnnotationRef>,
}

impl MatchContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_method_annotation(&mut self, kind: AnnotationKind) {
        self.method_annotation = Some(kind);
    }

    pub fn record_injection_point(&mut self, path: InjectionPointPath) {
        self.injection_point = Some(path);
    }

    pub fn record_class_annotation(&mut self, class_annotation: Option<ClassAnnotationRef>) {
        self.class_annotation = class_annotation;
    }

    pub fn method_annotation(&self) -> Option<AnnotationKind> {
        self.method_annotation
    }

    pub fn injection_point(&self) -> Option<InjectionPointPath> {
        self.injection_point
    }

    pub fn class_annotation(&self) -> Option<&ClassAnnotationRef> {
        self.class_annotation.as_ref()
    }
}
