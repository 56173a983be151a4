use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    /// Method access flags, as stored in `encoded_method`
    pub struct AccessFlags: u32 {
        /// Visible everywhere
        const PUBLIC = 0x0001;
        /// Only visible to the defining class
        const PRIVATE = 0x0002;
        /// Visible to the package and subclasses
        const PROTECTED = 0x0004;
        /// Does not take a `this` argument
        const STATIC = 0x0008;
        /// Not overridable
        const FINAL = 0x0010;
        /// Associated lock is acquired around calls
        const SYNCHRONIZED = 0x0020;
        /// Compiler-generated type-safe bridge method
        const BRIDGE = 0x0040;
        /// Last argument is a "rest" argument
        const VARARGS = 0x0080;
        /// Implemented in native code
        const NATIVE = 0x0100;
        /// Unimplemented but overridable
        const ABSTRACT = 0x0400;
        /// Strict floating point rules
        const STRICT = 0x0800;
        /// Not directly defined in source code
        const SYNTHETIC = 0x1000;
        /// Constructor or class initializer
        const CONSTRUCTOR = 0x10000;
        /// Declared `synchronized` in source
        const DECLARED_SYNCHRONIZED = 0x20000;
    }
}

/// Information about the method a code record belongs to.
///
/// A code record does not describe its own method: the access flags, the defining class
/// and the prototype live in other sections of the image, and the string and type pools are
/// shared by the whole image. The container layer that located the code record implements
/// this trait to supply them.
///
/// Indices passed to [`MethodContext::string`] and [`MethodContext::type_descriptor`] come
/// straight from the image and may be out of range; implementations return `None` then.
pub trait MethodContext {
    /// Access flags of the method.
    fn access_flags(&self) -> AccessFlags;

    /// Type descriptor of the class defining the method, e.g. `Lcom/example/Foo;`.
    fn defining_class(&self) -> &str;

    /// Type descriptors of the declared parameters, excluding `this`.
    fn parameter_types(&self) -> &[String];

    /// Resolves a string pool index.
    fn string(&self, index: u32) -> Option<&str>;

    /// Resolves a type pool index to its descriptor.
    fn type_descriptor(&self, index: u32) -> Option<&str>;
}

/// A [`MethodContext`] that knows nothing.
///
/// It describes a static method without parameters and resolves no index. Useful when only
/// the instructions or try blocks of a code record are of interest.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoContext;

impl MethodContext for NoContext {
    fn access_flags(&self) -> AccessFlags {
        AccessFlags::STATIC
    }

    fn defining_class(&self) -> &str {
        ""
    }

    fn parameter_types(&self) -> &[String] {
        &[]
    }

    fn string(&self, _index: u32) -> Option<&str> {
        None
    }

    fn type_descriptor(&self, _index: u32) -> Option<&str> {
        None
    }
}

/// A declared method parameter together with its name from the debug information.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MethodParameter<'a> {
    /// Type descriptor of the parameter
    pub type_descriptor: &'a str,
    /// Name of the parameter, when the debug information records one
    pub name: Option<&'a str>,
}

impl MethodParameter<'_> {
    /// Number of registers the parameter occupies; `long` and `double` take two.
    #[must_use]
    pub fn register_width(&self) -> usize {
        if is_wide(self.type_descriptor) {
            2
        } else {
            1
        }
    }
}

/// Returns `true` for the two-register `long` and `double` types.
pub(crate) fn is_wide(type_descriptor: &str) -> bool {
    matches!(type_descriptor, "J" | "D")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_flags() {
        let flags = AccessFlags::from_bits_truncate(0x0001 | 0x0008 | 0x10000 | 0x4000_0000);
        assert!(flags.contains(AccessFlags::PUBLIC | AccessFlags::STATIC));
        assert!(flags.contains(AccessFlags::CONSTRUCTOR));
        assert!(!flags.contains(AccessFlags::PRIVATE));
        assert_eq!(flags.bits(), 0x10009);
    }

    #[test]
    fn test_no_context() {
        let context = NoContext;
        assert!(context.access_flags().contains(AccessFlags::STATIC));
        assert!(context.parameter_types().is_empty());
        assert_eq!(context.string(0), None);
        assert_eq!(context.type_descriptor(0), None);
    }

    #[test]
    fn test_register_width() {
        let wide = MethodParameter {
            type_descriptor: "J",
            name: None,
        };
        let narrow = MethodParameter {
            type_descriptor: "Ljava/lang/String;",
            name: Some("s"),
        };
        assert_eq!(wide.register_width(), 2);
        assert_eq!(narrow.register_width(), 1);
    }
}
