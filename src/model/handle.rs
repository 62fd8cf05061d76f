//! Module handles that may wrap a module in a host-side indirection

/// Placement of a module managed by the training session
///
/// A `Replicated` module is owned by a data-parallel host wrapper. Every
/// component that needs the module itself (weight loading, EMA reads) goes
/// through [`ModuleHandle::unwrap_module`].
#[derive(Debug)]
pub enum ModuleHandle<M> {
    /// Module used directly
    Local(M),
    /// Module owned by a data-parallel wrapper
    Replicated {
        module: M,
        rank: usize,
        world_size: usize,
    },
}

impl<M> ModuleHandle<M> {
    /// Wrap a module used directly
    pub fn local(module: M) -> Self {
        ModuleHandle::Local(module)
    }

    /// Wrap a module replicated across `world_size` workers
    pub fn replicated(module: M, rank: usize, world_size: usize) -> Self {
        ModuleHandle::Replicated {
            module,
            rank,
            world_size,
        }
    }

    /// Resolve the underlying module
    pub fn unwrap_module(&self) -> &M {
        match self {
            ModuleHandle::Local(module) => module,
            ModuleHandle::Replicated { module, .. } => module,
        }
    }

    /// Resolve the underlying module mutably
    pub fn unwrap_module_mut(&mut self) -> &mut M {
        match self {
            ModuleHandle::Local(module) => module,
            ModuleHandle::Replicated { module, .. } => module,
        }
    }

    /// Whether the module sits behind a host wrapper
    pub fn is_wrapped(&self) -> bool {
        matches!(self, ModuleHandle::Replicated { .. })
    }

    /// Consume the handle and return the module
    pub fn into_inner(self) -> M {
        match self {
            ModuleHandle::Local(module) => module,
            ModuleHandle::Replicated { module, .. } => module,
        }
    }
}

impl<M> From<M> for ModuleHandle<M> {
    fn from(module: M) -> Self {
        ModuleHandle::Local(module)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unwrap_resolves_both_variants() {
        let local = ModuleHandle::local(7u32);
        assert_eq!(*local.unwrap_module(), 7);
        assert!(!local.is_wrapped());

        let mut wrapped = ModuleHandle::replicated(7u32, 0, 2);
        assert!(wrapped.is_wrapped());
        *wrapped.unwrap_module_mut() += 1;
        assert_eq!(wrapped.into_inner(), 8);
    }
}
