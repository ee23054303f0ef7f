use bitflags::bitflags;

bitflags! {
    /// Access flags on class definitions
    pub struct ClassAccessFlags: u32 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const INTERFACE = 0x0200;
        const ABSTRACT = 0x0400;
        const SYNTHETIC = 0x1000;
        const ANNOTATION = 0x2000;
        const ENUM = 0x4000;
    }
}

bitflags! {
    /// Access flags on `encoded_method` entries of a class data item
    pub struct MethodAccessFlags: u32 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const SYNCHRONIZED = 0x0020;
        const BRIDGE = 0x0040;
        const VARARGS = 0x0080;
        const NATIVE = 0x0100;
        const ABSTRACT = 0x0400;
        const STRICT = 0x0800;
        const SYNTHETIC = 0x1000;
        const CONSTRUCTOR = 0x1_0000;
        const DECLARED_SYNCHRONIZED = 0x2_0000;
    }
}

bitflags! {
    /// Access flags on `encoded_field` entries of a class data item
    pub struct FieldAccessFlags: u32 {
        const PUBLIC = 0x0001;
        const PRIVATE = 0x0002;
        const PROTECTED = 0x0004;
        const STATIC = 0x0008;
        const FINAL = 0x0010;
        const VOLATILE = 0x0040;
        const TRANSIENT = 0x0080;
        const SYNTHETIC = 0x1000;
        const ENUM = 0x4000;
    }
}

impl ClassAccessFlags {
    /// Bits a class definition may use at all (the rest are reserved for runtime bookkeeping)
    pub const JAVA_FLAGS_MASK: u32 = 0xffff;
}

impl MethodAccessFlags {
    /// Direct methods are the ones that are never dispatched virtually
    pub fn is_direct(self) -> bool {
        self.intersects(Self::STATIC | Self::PRIVATE | Self::CONSTRUCTOR)
    }

    /// Native and abstract methods are the only ones without a code item
    pub fn expects_code(self) -> bool {
        !self.intersects(Self::NATIVE | Self::ABSTRACT)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unknown_bits_are_not_representable() {
        assert!(FieldAccessFlags::from_bits(0x0008).is_some());
        assert!(FieldAccessFlags::from_bits(0x0020).is_none());
        assert!(ClassAccessFlags::from_bits(0x1_0000).is_none());
        assert!(MethodAccessFlags::from_bits(0x1_0001).is_some());
    }

    #[test]
    fn method_flavours() {
        let constructor = MethodAccessFlags::PUBLIC | MethodAccessFlags::CONSTRUCTOR;
        assert!(constructor.is_direct());
        assert!(constructor.expects_code());

        let interface_method = MethodAccessFlags::PUBLIC | MethodAccessFlags::ABSTRACT;
        assert!(!interface_method.is_direct());
        assert!(!interface_method.expects_code());
    }
}
