use std::cell::RefCell;

/// Anything that owns resources which must be released explicitly:
/// connections, remote objects and whole registries.
pub trait Disposable {
    /// Releases the object's resources. Must be safe to call more than once.
    fn dispose(&self);
}

/// Collects [`Disposable`]s so they can be torn down together
pub struct DisposalBin {
    items: RefCell<Vec<Box<dyn Disposable>>>,
}

impl DisposalBin {
    pub fn new() -> Self {
        Self {
            items: RefCell::new(Vec::new()),
        }
    }

    pub fn add<D: Disposable + 'static>(&self, item: D) {
        self.items.borrow_mut().push(Box::new(item));
    }

    pub fn len(&self) -> usize {
        self.items.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.borrow().is_empty()
    }

    /// Disposes every collected item in insertion order and empties the bin
    pub fn dispose_all(&self) {
        // items may add to the bin while disposing, so take them out first
        let items = std::mem::take(&mut *self.items.borrow_mut());
        for item in items.iter() {
            item.dispose();
        }
    }
}

impl Default for DisposalBin {
    fn default() -> Self {
        Self::new()
    }
}

impl Disposable for DisposalBin {
    fn dispose(&self) {
        self.dispose_all();
    }
}
