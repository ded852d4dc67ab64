//! Utility functions for the container

/// Dependency resolution utilities
pub mod dependency {
    use std::cell::RefCell;

    use crate::{ContainerError, ContainerResult};

    thread_local! {
        static RESOLVING: RefCell<Vec<(usize, usize, &'static str)>> = const { RefCell::new(Vec::new()) };
    }

    /// Marks a registration as being resolved on the current thread.
    ///
    /// Entering the same registration of the same provider twice on one
    /// thread means the construction graph loops back on itself. The mark
    /// is removed when the guard is dropped, on success and on error.
    #[derive(Debug)]
    pub struct ResolutionGuard {
        provider: usize,
        index: usize,
    }

    impl ResolutionGuard {
        /// # Errors
        ///
        /// Returns [`ContainerError::CircularDependency`] with the resolution
        /// chain when the registration is already being resolved.
        pub fn enter(provider: usize, index: usize, name: &'static str) -> ContainerResult<Self> {
            RESOLVING.with(|chain| {
                let mut chain = chain.borrow_mut();
                if chain.iter().any(|(p, i, _)| *p == provider && *i == index) {
                    let path: Vec<&str> = chain
                        .iter()
                        .filter(|(p, _, _)| *p == provider)
                        .map(|(_, _, n)| *n)
                        .chain(std::iter::once(name))
                        .collect();
                    return Err(ContainerError::CircularDependency(path.join(" -> ")));
                }
                chain.push((provider, index, name));
                Ok(Self { provider, index })
            })
        }

        /// Names currently being resolved on this thread, outermost first.
        pub fn current_chain() -> Vec<&'static str> {
            RESOLVING.with(|chain| chain.borrow().iter().map(|(_, _, n)| *n).collect())
        }
    }

    impl Drop for ResolutionGuard {
        fn drop(&mut self) {
            RESOLVING.with(|chain| {
                let mut chain = chain.borrow_mut();
                if let Some(pos) = chain
                    .iter()
                    .rposition(|(p, i, _)| *p == self.provider && *i == self.index)
                {
                    chain.remove(pos);
                }
            });
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_reentering_is_circular() {
            let _a = ResolutionGuard::enter(1, 0, "serviceA").unwrap();
            let _b = ResolutionGuard::enter(1, 1, "serviceB").unwrap();

            match ResolutionGuard::enter(1, 0, "serviceA") {
                Err(ContainerError::CircularDependency(chain)) => {
                    assert_eq!(chain, "serviceA -> serviceB -> serviceA");
                }
                other => panic!("Expected CircularDependency, got {:?}", other),
            }
        }

        #[test]
        fn test_guard_drop_clears_mark() {
            {
                let _a = ResolutionGuard::enter(2, 0, "serviceA").unwrap();
                assert_eq!(ResolutionGuard::current_chain(), vec!["serviceA"]);
            }
            assert!(ResolutionGuard::current_chain().is_empty());
            assert!(ResolutionGuard::enter(2, 0, "serviceA").is_ok());
        }

        #[test]
        fn test_providers_are_tracked_separately() {
            let _a = ResolutionGuard::enter(3, 0, "serviceA").unwrap();
            assert!(ResolutionGuard::enter(4, 0, "serviceA").is_ok());
        }
    }
}
