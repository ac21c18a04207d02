//! Declarative descriptions of sought host capabilities.
//!
//! A [`BindingTarget`] names a capability, lists the classes it may live in and
//! describes the member by shape rather than by name, since names are obfuscated and
//! shift between host releases.
//!
//! # Examples
//!
//! ```rust
//! use wirescope::binding::{BindingTarget, TypeMatcher};
//!
//! // void m(?, ?, ?, ?) with an int, a Bundle and a List among the parameters
//! let target = BindingTarget::method("msg_view_update")
//!     .in_class("com.tencent.mobileqq.aio.msglist.holder.AIOBubbleMsgItemVB")
//!     .returns(TypeMatcher::void())
//!     .param_count(4)
//!     .optional_marker(TypeMatcher::IntOrBoxed)
//!     .marker(TypeMatcher::exact("android.os.Bundle"))
//!     .marker(TypeMatcher::assignable("java.util.List"));
//!
//! assert_eq!(target.id(), "msg_view_update");
//! ```

use std::fmt;

use crate::binding::{
    metadata::MetadataProvider,
    types::{FieldInfo, MethodInfo, Modifiers, Primitive, TypeSig},
};

/// How a type in the shape is compared with a declared type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TypeMatcher {
    /// Any type
    Any,
    /// Exactly this type
    Exact(TypeSig),
    /// `int` or `java.lang.Integer`
    IntOrBoxed,
    /// A class type assignable to the named class or interface
    AssignableTo(String),
}

impl TypeMatcher {
    /// Exact match on a type written as a descriptor or source name; unparsable text
    /// is treated as a class name.
    #[must_use]
    pub fn exact(name: &str) -> Self {
        TypeMatcher::Exact(TypeSig::parse(name).unwrap_or_else(|_| TypeSig::class(name)))
    }

    /// Exact match on `void`.
    #[must_use]
    pub fn void() -> Self {
        TypeMatcher::Exact(TypeSig::Primitive(Primitive::Void))
    }

    /// Assignability to the named class or interface.
    #[must_use]
    pub fn assignable(name: &str) -> Self {
        TypeMatcher::AssignableTo(name.replace('/', "."))
    }

    /// Test a declared type.
    pub fn matches(&self, sig: &TypeSig, provider: &dyn MetadataProvider) -> bool {
        match self {
            TypeMatcher::Any => true,
            TypeMatcher::Exact(expected) => expected == sig,
            TypeMatcher::IntOrBoxed => {
                matches!(sig, TypeSig::Primitive(Primitive::Int))
                    || sig.class_name() == Some("java.lang.Integer")
            }
            TypeMatcher::AssignableTo(target) => provider.is_assignable(sig, target),
        }
    }
}

impl fmt::Display for TypeMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeMatcher::Any => f.write_str("*"),
            TypeMatcher::Exact(sig) => write!(f, "{sig}"),
            TypeMatcher::IntOrBoxed => f.write_str("int|Integer"),
            TypeMatcher::AssignableTo(target) => write!(f, "? extends {target}"),
        }
    }
}

/// A parameter type that must appear somewhere in the parameter list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Marker {
    /// Type the parameter must match
    pub matcher: TypeMatcher,
    /// Whether the relaxed probe may drop this marker
    pub optional: bool,
}

/// Structural description of the sought member.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemberShape {
    /// A method
    Method {
        /// Exact name, when it is stable
        name: Option<String>,
        /// Return type
        return_type: TypeMatcher,
        /// Exact parameter count
        param_count: Option<usize>,
        /// Parameter types that must be present, order-insensitive, as a multiset
        markers: Vec<Marker>,
        /// Flags that must be set
        required: Modifiers,
        /// Flags that must be clear
        forbidden: Modifiers,
    },
    /// A field
    Field {
        /// Exact name, when it is stable
        name: Option<String>,
        /// Declared type
        field_type: TypeMatcher,
        /// Also search superclasses of the candidate class
        inherited: bool,
        /// Flags that must be set
        required: Modifiers,
        /// Flags that must be clear
        forbidden: Modifiers,
    },
}

/// A sought host capability.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingTarget {
    id: String,
    candidates: Vec<String>,
    shape: MemberShape,
}

impl BindingTarget {
    /// Start describing a method capability.
    #[must_use]
    pub fn method(id: &str) -> Self {
        BindingTarget {
            id: id.to_string(),
            candidates: Vec::new(),
            shape: MemberShape::Method {
                name: None,
                return_type: TypeMatcher::Any,
                param_count: None,
                markers: Vec::new(),
                required: Modifiers::empty(),
                forbidden: Modifiers::empty(),
            },
        }
    }

    /// Start describing a field capability.
    #[must_use]
    pub fn field(id: &str) -> Self {
        BindingTarget {
            id: id.to_string(),
            candidates: Vec::new(),
            shape: MemberShape::Field {
                name: None,
                field_type: TypeMatcher::Any,
                inherited: false,
                required: Modifiers::empty(),
                forbidden: Modifiers::empty(),
            },
        }
    }

    /// Add a candidate class; candidates are probed in the order added.
    #[must_use]
    pub fn in_class(mut self, class: &str) -> Self {
        self.candidates.push(class.replace('/', "."));
        self
    }

    /// Require an exact member name.
    #[must_use]
    pub fn named(mut self, member: &str) -> Self {
        match &mut self.shape {
            MemberShape::Method { name, .. } | MemberShape::Field { name, .. } => {
                *name = Some(member.to_string());
            }
        }
        self
    }

    /// Require a return type (methods only).
    #[must_use]
    pub fn returns(mut self, matcher: TypeMatcher) -> Self {
        if let MemberShape::Method { return_type, .. } = &mut self.shape {
            *return_type = matcher;
        }
        self
    }

    /// Require an exact parameter count (methods only).
    #[must_use]
    pub fn param_count(mut self, count: usize) -> Self {
        if let MemberShape::Method { param_count, .. } = &mut self.shape {
            *param_count = Some(count);
        }
        self
    }

    /// Require a parameter matching `matcher` (methods only).
    #[must_use]
    pub fn marker(self, matcher: TypeMatcher) -> Self {
        self.push_marker(matcher, false)
    }

    /// Require a parameter matching `matcher`, droppable by the relaxed probe.
    #[must_use]
    pub fn optional_marker(self, matcher: TypeMatcher) -> Self {
        self.push_marker(matcher, true)
    }

    fn push_marker(mut self, matcher: TypeMatcher, optional: bool) -> Self {
        if let MemberShape::Method { markers, .. } = &mut self.shape {
            markers.push(Marker { matcher, optional });
        }
        self
    }

    /// Require a declared type (fields only).
    #[must_use]
    pub fn of_type(mut self, matcher: TypeMatcher) -> Self {
        if let MemberShape::Field { field_type, .. } = &mut self.shape {
            *field_type = matcher;
        }
        self
    }

    /// Search superclasses too (fields only).
    #[must_use]
    pub fn inherited(mut self) -> Self {
        if let MemberShape::Field { inherited, .. } = &mut self.shape {
            *inherited = true;
        }
        self
    }

    /// Require modifier flags.
    #[must_use]
    pub fn requires(mut self, flags: Modifiers) -> Self {
        match &mut self.shape {
            MemberShape::Method { required, .. } | MemberShape::Field { required, .. } => {
                *required |= flags;
            }
        }
        self
    }

    /// Forbid modifier flags.
    #[must_use]
    pub fn forbids(mut self, flags: Modifiers) -> Self {
        match &mut self.shape {
            MemberShape::Method { forbidden, .. } | MemberShape::Field { forbidden, .. } => {
                *forbidden |= flags;
            }
        }
        self
    }

    /// Capability id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Candidate classes in probe order.
    #[must_use]
    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// The member shape.
    #[must_use]
    pub fn shape(&self) -> &MemberShape {
        &self.shape
    }

    /// Shapes for the relaxed probe: one per optional marker, in declaration order,
    /// each with that marker removed.
    #[must_use]
    pub fn relaxed_shapes(&self) -> Vec<MemberShape> {
        let MemberShape::Method { markers, .. } = &self.shape else {
            return Vec::new();
        };

        markers
            .iter()
            .enumerate()
            .filter(|(_, marker)| marker.optional)
            .map(|(skip, _)| {
                let mut shape = self.shape.clone();
                if let MemberShape::Method { markers, .. } = &mut shape {
                    markers.remove(skip);
                }
                shape
            })
            .collect()
    }
}

impl fmt::Display for MemberShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemberShape::Method {
                name,
                return_type,
                param_count,
                markers,
                required,
                forbidden,
            } => {
                let markers: Vec<String> = markers
                    .iter()
                    .map(|m| {
                        if m.optional {
                            format!("{}?", m.matcher)
                        } else {
                            m.matcher.to_string()
                        }
                    })
                    .collect();
                write!(
                    f,
                    "{return_type} {}(#{}; {}) +{:?} -{:?}",
                    name.as_deref().unwrap_or("*"),
                    param_count.map_or_else(|| "*".to_string(), |c| c.to_string()),
                    markers.join(", "),
                    required,
                    forbidden
                )
            }
            MemberShape::Field {
                name, field_type, ..
            } => write!(f, "{field_type} {}", name.as_deref().unwrap_or("*")),
        }
    }
}

fn modifiers_ok(actual: Modifiers, required: Modifiers, forbidden: Modifiers) -> bool {
    actual.contains(required) && !actual.intersects(forbidden)
}

/// Assign each marker to a distinct parameter. Backtracking over markers, which are few.
fn markers_satisfied(
    params: &[TypeSig],
    markers: &[Marker],
    used: &mut Vec<bool>,
    provider: &dyn MetadataProvider,
) -> bool {
    let Some((first, rest)) = markers.split_first() else {
        return true;
    };

    for (index, param) in params.iter().enumerate() {
        if used[index] || !first.matcher.matches(param, provider) {
            continue;
        }
        used[index] = true;
        if markers_satisfied(params, rest, used, provider) {
            return true;
        }
        used[index] = false;
    }
    false
}

impl MemberShape {
    /// Test a declared method against this shape.
    pub fn matches_method(&self, method: &MethodInfo, provider: &dyn MetadataProvider) -> bool {
        let MemberShape::Method {
            name,
            return_type,
            param_count,
            markers,
            required,
            forbidden,
        } = self
        else {
            return false;
        };

        if name.as_ref().is_some_and(|name| *name != method.name) {
            return false;
        }
        if param_count.is_some_and(|count| count != method.params.len()) {
            return false;
        }
        if !modifiers_ok(method.modifiers, *required, *forbidden) {
            return false;
        }
        if !return_type.matches(&method.return_type, provider) {
            return false;
        }
        if markers.len() > method.params.len() {
            return false;
        }

        let mut used = vec![false; method.params.len()];
        markers_satisfied(&method.params, markers, &mut used, provider)
    }

    /// Test a declared field against this shape.
    pub fn matches_field(&self, field: &FieldInfo, provider: &dyn MetadataProvider) -> bool {
        let MemberShape::Field {
            name,
            field_type,
            required,
            forbidden,
            ..
        } = self
        else {
            return false;
        };

        name.as_ref().is_none_or(|name| *name == field.name)
            && modifiers_ok(field.modifiers, *required, *forbidden)
            && field_type.matches(&field.field_type, provider)
    }
}
