//! Symbol data produced by the compilation layer.
//!
//! Symbols are immutable once a [`Solution`](super::Solution) is built. The
//! find-references engine only ever reads them.

use smol_str::SmolStr;

use crate::base::{DocumentId, ProjectId, SymbolId, TextRange};

/// The broad category of a symbol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SymbolKind {
    Namespace,
    Type,
    Method,
    Property,
    Event,
    Field,
    Alias,
    Local,
}

impl SymbolKind {
    /// Whether symbols of this kind can implement interface members or
    /// override base members.
    pub fn participates_in_inheritance(self) -> bool {
        matches!(self, SymbolKind::Method | SymbolKind::Property | SymbolKind::Event)
    }

    /// Prefix used in symbol keys (`T:Shop.Widget`, `M:Shop.Widget.Spin()`).
    pub(crate) fn key_prefix(self) -> &'static str {
        match self {
            SymbolKind::Namespace => "N:",
            SymbolKind::Type => "T:",
            SymbolKind::Method => "M:",
            SymbolKind::Property => "P:",
            SymbolKind::Event => "E:",
            SymbolKind::Field => "F:",
            SymbolKind::Alias => "A:",
            SymbolKind::Local => "L:",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Class,
    Interface,
    Struct,
    Enum,
    Delegate,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MethodKind {
    Ordinary,
    Constructor,
    PropertyGet,
    PropertySet,
    EventAdd,
    EventRemove,
}

impl MethodKind {
    pub fn is_property_accessor(self) -> bool {
        matches!(self, MethodKind::PropertyGet | MethodKind::PropertySet)
    }

    pub fn is_accessor(self) -> bool {
        !matches!(self, MethodKind::Ordinary | MethodKind::Constructor)
    }

    /// Name prefix the compiler gives accessor methods (`get_Count`).
    pub(crate) fn accessor_prefix(self) -> Option<&'static str> {
        match self {
            MethodKind::PropertyGet => Some("get_"),
            MethodKind::PropertySet => Some("set_"),
            MethodKind::EventAdd => Some("add_"),
            MethodKind::EventRemove => Some("remove_"),
            MethodKind::Ordinary | MethodKind::Constructor => None,
        }
    }
}

/// Declared accessibility, as written on the declaration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum Accessibility {
    #[default]
    Public,
    ProtectedOrInternal,
    Protected,
    Internal,
    ProtectedAndInternal,
    Private,
}

/// Declaration modifiers relevant to inheritance.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub struct Modifiers {
    pub is_static: bool,
    pub is_sealed: bool,
    pub is_virtual: bool,
    pub is_abstract: bool,
    pub is_override: bool,
}

/// A declaration site in source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SourceLocation {
    pub document: DocumentId,
    pub range: TextRange,
}

/// Where a symbol comes from.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum SymbolOrigin {
    /// Declared in the documents of `project`. Shared by every compilation
    /// that references the project.
    Source {
        project: ProjectId,
        locations: Vec<SourceLocation>,
    },
    /// Read from a metadata reference. Each referencing compilation gets its
    /// own instance.
    Metadata { compilation: ProjectId },
}

/// A symbol as seen by the engine.
#[derive(Clone, Debug)]
pub struct SymbolData {
    pub id: SymbolId,
    pub name: SmolStr,
    /// Documentation-comment style id; stable across compilations.
    pub key: SmolStr,
    pub kind: SymbolKind,
    pub type_kind: Option<TypeKind>,
    pub method_kind: Option<MethodKind>,
    pub accessibility: Accessibility,
    pub modifiers: Modifiers,
    pub origin: SymbolOrigin,
    /// Name of the defining assembly; `None` for namespaces and locals.
    pub containing_assembly: Option<SmolStr>,
    pub container: Option<SymbolId>,
    /// Parameter list, e.g. `(int,string)`. Empty for non-methods.
    pub signature: SmolStr,
    pub base_type: Option<SymbolId>,
    /// Interfaces listed directly in the declaration.
    pub interfaces: Vec<SymbolId>,
    pub members: Vec<SymbolId>,
    pub overridden: Option<SymbolId>,
    pub explicit_implementations: Vec<SymbolId>,
    /// For accessors: the owning property or event.
    pub associated_symbol: Option<SymbolId>,
    /// For properties and events: their accessor methods.
    pub accessors: Vec<SymbolId>,
    pub alias_target: Option<SymbolId>,
    /// Set on reduced or constructed forms; points at the definition.
    pub original_definition: Option<SymbolId>,
}

impl SymbolData {
    pub fn is_source(&self) -> bool {
        matches!(&self.origin, SymbolOrigin::Source { locations, .. } if !locations.is_empty())
    }

    pub fn source_locations(&self) -> &[SourceLocation] {
        match &self.origin {
            SymbolOrigin::Source { locations, .. } => locations,
            SymbolOrigin::Metadata { .. } => &[],
        }
    }

    /// The project whose compilation owns this symbol instance.
    pub fn compilation(&self) -> ProjectId {
        match self.origin {
            SymbolOrigin::Source { project, .. } => project,
            SymbolOrigin::Metadata { compilation } => compilation,
        }
    }

    pub fn is_type(&self) -> bool {
        self.kind == SymbolKind::Type
    }

    pub fn is_interface(&self) -> bool {
        self.type_kind == Some(TypeKind::Interface)
    }

    pub fn is_class(&self) -> bool {
        self.type_kind == Some(TypeKind::Class)
    }

    pub fn is_delegate(&self) -> bool {
        self.type_kind == Some(TypeKind::Delegate)
    }

    pub fn is_sealed(&self) -> bool {
        self.modifiers.is_sealed
    }

    pub fn is_static(&self) -> bool {
        self.modifiers.is_static
    }

    pub fn is_constructor(&self) -> bool {
        self.method_kind == Some(MethodKind::Constructor)
    }

    pub fn is_property_accessor(&self) -> bool {
        self.method_kind.is_some_and(MethodKind::is_property_accessor)
    }

    /// Virtual, abstract or override members that a derived type may override.
    pub fn is_overridable(&self) -> bool {
        let m = self.modifiers;
        (m.is_virtual || m.is_abstract || m.is_override) && !m.is_sealed
    }
}

/// Why a token bound to candidates instead of a single symbol.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CandidateReason {
    Ambiguous,
    OverloadResolutionFailure,
    Inaccessible,
    NotInvocable,
    NotAValue,
    WrongArity,
}

/// How a bound token uses the value it refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ValueUsage {
    #[default]
    Read,
    Write,
    ReadWrite,
    /// `nameof(x)` and similar: mentioned, neither read nor written.
    Name,
}

impl ValueUsage {
    pub fn is_read(self) -> bool {
        matches!(self, ValueUsage::Read | ValueUsage::ReadWrite)
    }

    pub fn is_write(self) -> bool {
        matches!(self, ValueUsage::Write | ValueUsage::ReadWrite)
    }
}

/// The binding of one token.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SymbolInfo {
    pub symbol: Option<SymbolId>,
    pub candidates: Vec<SymbolId>,
    pub candidate_reason: Option<CandidateReason>,
    pub usage: ValueUsage,
}

impl SymbolInfo {
    pub fn is_empty(&self) -> bool {
        self.symbol.is_none() && self.candidates.is_empty()
    }
}
