//! Structural type model of host classes.
//!
//! Host members are described the way the host's own class files describe them: a
//! [`TypeSig`] per type (primitive, class or array), [`Modifiers`] access flags and
//! per-member records ([`MethodInfo`], [`FieldInfo`], [`ClassInfo`]). Types can be
//! written either as JVM descriptors (`I`, `Ljava/util/List;`, `[B`) or as source names
//! (`int`, `java.util.List`, `byte[]`); both parse to the same [`TypeSig`].

use std::fmt;

use bitflags::bitflags;
use strum::{Display, EnumIter, EnumString};

use crate::Result;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    /// Member access and property flags, using the class file bit values
    pub struct Modifiers: u32 {
        /// Accessible from everywhere
        const PUBLIC = 0x0001;
        /// Accessible only from the declaring class
        const PRIVATE = 0x0002;
        /// Accessible from subclasses and the package
        const PROTECTED = 0x0004;
        /// Belongs to the class rather than an instance
        const STATIC = 0x0008;
        /// Cannot be overridden or reassigned
        const FINAL = 0x0010;
        /// Holds the instance monitor while running
        const SYNCHRONIZED = 0x0020;
        /// Field is volatile (bridge method for methods)
        const VOLATILE = 0x0040;
        /// Implemented natively
        const NATIVE = 0x0100;
        /// Has no implementation in the declaring class
        const ABSTRACT = 0x0400;
        /// Generated by the compiler
        const SYNTHETIC = 0x1000;
    }
}

/// Primitive host types, named as in source code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, EnumString)]
#[strum(serialize_all = "lowercase")]
pub enum Primitive {
    /// `V`
    Void,
    /// `Z`
    Boolean,
    /// `B`
    Byte,
    /// `S`
    Short,
    /// `C`
    Char,
    /// `I`
    Int,
    /// `J`
    Long,
    /// `F`
    Float,
    /// `D`
    Double,
}

impl Primitive {
    /// Map a one-letter descriptor code to a primitive.
    #[must_use]
    pub fn from_code(code: char) -> Option<Self> {
        Some(match code {
            'V' => Primitive::Void,
            'Z' => Primitive::Boolean,
            'B' => Primitive::Byte,
            'S' => Primitive::Short,
            'C' => Primitive::Char,
            'I' => Primitive::Int,
            'J' => Primitive::Long,
            'F' => Primitive::Float,
            'D' => Primitive::Double,
            _ => return None,
        })
    }

    /// The one-letter descriptor code.
    #[must_use]
    pub fn code(self) -> char {
        match self {
            Primitive::Void => 'V',
            Primitive::Boolean => 'Z',
            Primitive::Byte => 'B',
            Primitive::Short => 'S',
            Primitive::Char => 'C',
            Primitive::Int => 'I',
            Primitive::Long => 'J',
            Primitive::Float => 'F',
            Primitive::Double => 'D',
        }
    }
}

/// A host type.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeSig {
    /// Primitive type
    Primitive(Primitive),
    /// Class or interface, by dotted name (`java.util.List`)
    Class(String),
    /// Array of the element type
    Array(Box<TypeSig>),
}

impl TypeSig {
    /// Shorthand for a class type.
    #[must_use]
    pub fn class(name: &str) -> Self {
        TypeSig::Class(name.replace('/', "."))
    }

    /// Parse a type written either as a descriptor or as a source name.
    ///
    /// Descriptors are recognised by a trailing `;`, a `/` separator, a leading `[`
    /// or a single primitive code letter.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for empty or unterminated input.
    pub fn parse(text: &str) -> Result<Self> {
        let text = text.trim();
        if text.is_empty() {
            return Err(malformed_error!("Empty type name"));
        }

        if text.starts_with('[') || text.ends_with(';') || text.contains('/') || text.len() == 1 {
            if let Ok(sig) = Self::parse_descriptor(text) {
                return Ok(sig);
            }
        }
        Self::parse_name(text)
    }

    /// Parse a source name such as `int`, `java.util.List` or `byte[][]`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for an empty name.
    pub fn parse_name(text: &str) -> Result<Self> {
        let mut base = text.trim();
        let mut dimensions = 0;
        while let Some(stripped) = base.strip_suffix("[]") {
            base = stripped.trim_end();
            dimensions += 1;
        }
        if base.is_empty() {
            return Err(malformed_error!("Empty type name in '{}'", text));
        }

        let mut sig = match base.parse::<Primitive>() {
            Ok(primitive) => TypeSig::Primitive(primitive),
            Err(_) => TypeSig::class(base),
        };
        for _ in 0..dimensions {
            sig = TypeSig::Array(Box::new(sig));
        }
        Ok(sig)
    }

    /// Parse a single complete descriptor such as `[Ljava/lang/String;`.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the text is not exactly one descriptor.
    pub fn parse_descriptor(text: &str) -> Result<Self> {
        let mut chars = text.chars().peekable();
        let sig = Self::read_descriptor(&mut chars, text)?;
        if chars.peek().is_some() {
            return Err(malformed_error!("Trailing data in descriptor '{}'", text));
        }
        Ok(sig)
    }

    fn read_descriptor(
        chars: &mut std::iter::Peekable<std::str::Chars<'_>>,
        source: &str,
    ) -> Result<Self> {
        let mut dimensions = 0;
        while chars.peek() == Some(&'[') {
            chars.next();
            dimensions += 1;
        }

        let mut sig = match chars.next() {
            Some('L') => {
                let name: String = chars.by_ref().take_while(|&c| c != ';').collect();
                if name.is_empty() {
                    return Err(malformed_error!("Empty class in descriptor '{}'", source));
                }
                TypeSig::class(&name)
            }
            Some(code) => match Primitive::from_code(code) {
                Some(primitive) => TypeSig::Primitive(primitive),
                None => {
                    return Err(malformed_error!(
                        "Unknown descriptor code '{}' in '{}'",
                        code,
                        source
                    ))
                }
            },
            None => return Err(malformed_error!("Truncated descriptor '{}'", source)),
        };

        for _ in 0..dimensions {
            sig = TypeSig::Array(Box::new(sig));
        }
        Ok(sig)
    }

    /// Parse a method descriptor `(params)return` into parameter and return types.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] if the descriptor is not well-formed.
    pub fn parse_method_descriptor(text: &str) -> Result<(Vec<TypeSig>, TypeSig)> {
        let Some(rest) = text.trim().strip_prefix('(') else {
            return Err(malformed_error!("Method descriptor '{}' must start with '('", text));
        };
        let Some((params, ret)) = rest.split_once(')') else {
            return Err(malformed_error!("Method descriptor '{}' is missing ')'", text));
        };

        let mut chars = params.chars().peekable();
        let mut parsed = Vec::new();
        while chars.peek().is_some() {
            parsed.push(Self::read_descriptor(&mut chars, text)?);
        }
        Ok((parsed, Self::parse_descriptor(ret)?))
    }

    /// JVM descriptor form.
    #[must_use]
    pub fn descriptor(&self) -> String {
        match self {
            TypeSig::Primitive(primitive) => primitive.code().to_string(),
            TypeSig::Class(name) => format!("L{};", name.replace('.', "/")),
            TypeSig::Array(element) => format!("[{}", element.descriptor()),
        }
    }

    /// Class name, for class types.
    #[must_use]
    pub fn class_name(&self) -> Option<&str> {
        match self {
            TypeSig::Class(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for TypeSig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TypeSig::Primitive(primitive) => write!(f, "{primitive}"),
            TypeSig::Class(name) => f.write_str(name),
            TypeSig::Array(element) => write!(f, "{element}[]"),
        }
    }
}

/// A declared method.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodInfo {
    /// Method name
    pub name: String,
    /// Parameter types in declaration order
    pub params: Vec<TypeSig>,
    /// Return type
    pub return_type: TypeSig,
    /// Access and property flags
    pub modifiers: Modifiers,
}

impl MethodInfo {
    /// Build a method from its name and a `(params)return` descriptor.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for a bad descriptor.
    pub fn from_descriptor(name: &str, descriptor: &str, modifiers: Modifiers) -> Result<Self> {
        let (params, return_type) = TypeSig::parse_method_descriptor(descriptor)?;
        Ok(MethodInfo {
            name: name.to_string(),
            params,
            return_type,
            modifiers,
        })
    }

    /// `(params)return` descriptor.
    #[must_use]
    pub fn descriptor(&self) -> String {
        let params: String = self.params.iter().map(TypeSig::descriptor).collect();
        format!("({params}){}", self.return_type.descriptor())
    }
}

impl fmt::Display for MethodInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let params: Vec<String> = self.params.iter().map(ToString::to_string).collect();
        write!(f, "{} {}({})", self.return_type, self.name, params.join(", "))
    }
}

/// A declared field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldInfo {
    /// Field name
    pub name: String,
    /// Declared type
    pub field_type: TypeSig,
    /// Access and property flags
    pub modifiers: Modifiers,
}

impl fmt::Display for FieldInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.field_type, self.name)
    }
}

/// A host class and its declared members, in declaration order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ClassInfo {
    /// Dotted class name
    pub name: String,
    /// Direct superclass
    pub superclass: Option<String>,
    /// Directly implemented interfaces
    pub interfaces: Vec<String>,
    /// Declared methods
    pub methods: Vec<MethodInfo>,
    /// Declared fields
    pub fields: Vec<FieldInfo>,
}

impl ClassInfo {
    /// Create an empty class.
    #[must_use]
    pub fn new(name: &str) -> Self {
        ClassInfo {
            name: name.replace('/', "."),
            ..Self::default()
        }
    }

    /// Set the superclass.
    #[must_use]
    pub fn extends(mut self, superclass: &str) -> Self {
        self.superclass = Some(superclass.replace('/', "."));
        self
    }

    /// Add an implemented interface.
    #[must_use]
    pub fn implements(mut self, interface: &str) -> Self {
        self.interfaces.push(interface.replace('/', "."));
        self
    }

    /// Declare a method from its descriptor.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for a bad descriptor.
    pub fn method(mut self, name: &str, descriptor: &str, modifiers: Modifiers) -> Result<Self> {
        self.methods
            .push(MethodInfo::from_descriptor(name, descriptor, modifiers)?);
        Ok(self)
    }

    /// Declare a field; the type may be a descriptor or a source name.
    ///
    /// # Errors
    /// Returns [`crate::Error::Malformed`] for a bad type.
    pub fn field(mut self, name: &str, field_type: &str, modifiers: Modifiers) -> Result<Self> {
        self.fields.push(FieldInfo {
            name: name.to_string(),
            field_type: TypeSig::parse(field_type)?,
            modifiers,
        });
        Ok(self)
    }
}

#[cfg(test)]
mod tests {
    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn primitive_codes() {
        for primitive in Primitive::iter() {
            assert_eq!(Primitive::from_code(primitive.code()), Some(primitive));
            assert_eq!(
                TypeSig::parse(&primitive.to_string()).unwrap(),
                TypeSig::Primitive(primitive)
            );
        }
    }

    #[test]
    fn descriptors_and_names_agree() {
        let pairs = [
            ("I", "int"),
            ("Ljava/util/List;", "java.util.List"),
            ("[B", "byte[]"),
            ("[[Ljava/lang/String;", "java.lang.String[][]"),
        ];
        for (descriptor, name) in pairs {
            let from_descriptor = TypeSig::parse(descriptor).unwrap();
            let from_name = TypeSig::parse(name).unwrap();
            assert_eq!(from_descriptor, from_name);
            assert_eq!(from_descriptor.descriptor(), descriptor);
            assert_eq!(from_name.to_string(), name);
        }
    }

    #[test]
    fn single_letter_class_names() {
        // a one-letter obfuscated class name that is not a primitive code
        assert_eq!(TypeSig::parse("a").unwrap(), TypeSig::Class("a".into()));
    }

    #[test]
    fn method_descriptors() {
        let (params, ret) =
            TypeSig::parse_method_descriptor("(ILandroid/os/Bundle;Ljava/util/List;[B)V").unwrap();
        assert_eq!(params.len(), 4);
        assert_eq!(params[1], TypeSig::class("android.os.Bundle"));
        assert_eq!(ret, TypeSig::Primitive(Primitive::Void));

        assert!(TypeSig::parse_method_descriptor("I)V").is_err());
        assert!(TypeSig::parse_method_descriptor("(Q)V").is_err());
        assert!(TypeSig::parse_method_descriptor("(L;)V").is_err());
    }

    #[test]
    fn method_display_and_descriptor() {
        let method = MethodInfo::from_descriptor(
            "dispatchRespMsg",
            "(Lmqq/app/msghandle/MsgRespHandler;Ljava/lang/Object;)V",
            Modifiers::PUBLIC | Modifiers::FINAL,
        )
        .unwrap();
        assert_eq!(
            method.to_string(),
            "void dispatchRespMsg(mqq.app.msghandle.MsgRespHandler, java.lang.Object)"
        );
        assert_eq!(
            method.descriptor(),
            "(Lmqq/app/msghandle/MsgRespHandler;Ljava/lang/Object;)V"
        );
    }
}
