//! The slot table: which slots hold a live allocation, and how big it is.

/// Why an allocation or free attempt was dropped.
///
/// Rejections are expected during generation. Patterns treat every rejection
/// as "skip this attempt" and carry on.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rejected {
    /// The slot index is past the end of the table.
    OutOfRange,
    /// Allocating into a slot that is already live.
    Occupied,
    /// Freeing a slot that is not live.
    Empty,
    /// Live allocations must have a positive size.
    ZeroSize,
    /// The allocation would push the live total past the budget.
    OverBudget,
}

/// A fixed-size table of slots, each either empty or holding a live size.
///
/// The table enforces the legality rules for every generated trace:
///
/// * a slot is never allocated while it is live,
/// * a slot is never freed while it is empty, and
/// * the sum of live sizes never exceeds the budget.
#[derive(Clone, Debug)]
pub struct SlotTable {
    /// Live size per slot, `None` when the slot is empty.
    sizes: Vec<Option<usize>>,

    /// The total number of bytes currently live.
    live_bytes: usize,

    /// The live total should never surpass this limit.
    budget: usize,
}

impl SlotTable {
    /// Create an all-empty table of `slot_count` slots with the given budget.
    pub fn new(slot_count: usize, budget: usize) -> Self {
        SlotTable {
            sizes: vec![None; slot_count],
            live_bytes: 0,
            budget,
        }
    }

    /// Number of slots in the table.
    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    /// Does the table have zero slots?
    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    /// The configured budget.
    pub fn budget(&self) -> usize {
        self.budget
    }

    /// Sum of all live sizes.
    pub fn live_bytes(&self) -> usize {
        self.live_bytes
    }

    /// How many more bytes fit before hitting the budget.
    pub fn remaining_budget(&self) -> usize {
        self.budget - self.live_bytes
    }

    /// Number of live slots.
    pub fn live_count(&self) -> usize {
        self.sizes.iter().filter(|s| s.is_some()).count()
    }

    /// The live size of slot `index`, if any.
    pub fn size_of(&self, index: usize) -> Option<usize> {
        self.sizes.get(index).copied().flatten()
    }

    /// Would an allocation of the given size push us past the budget?
    fn beyond_budget(&self, size: usize) -> bool {
        size > self.remaining_budget()
    }

    /// Mark slot `index` live with `size` bytes.
    ///
    /// Fails without side effects if the slot is live already or the
    /// allocation does not fit in the remaining budget.
    pub fn try_allocate(&mut self, index: usize, size: usize) -> Result<(), Rejected> {
        let slot = self.sizes.get(index).ok_or(Rejected::OutOfRange)?;
        if slot.is_some() {
            return Err(Rejected::Occupied);
        }
        if size == 0 {
            return Err(Rejected::ZeroSize);
        }
        if self.beyond_budget(size) {
            return Err(Rejected::OverBudget);
        }

        self.sizes[index] = Some(size);
        self.live_bytes += size;
        debug_assert!(self.live_bytes <= self.budget);
        Ok(())
    }

    /// Mark slot `index` empty, returning the size it held.
    pub fn try_free(&mut self, index: usize) -> Result<usize, Rejected> {
        let slot = self.sizes.get_mut(index).ok_or(Rejected::OutOfRange)?;
        let size = slot.take().ok_or(Rejected::Empty)?;
        self.live_bytes -= size;
        Ok(size)
    }

    /// Indices of every empty slot, in ascending order.
    pub fn free_indices(&self) -> Vec<usize> {
        self.indices_where(|slot| slot.is_none())
    }

    /// Indices of every live slot, in ascending order.
    pub fn live_indices(&self) -> Vec<usize> {
        self.indices_where(|slot| slot.is_some())
    }

    fn indices_where(&self, pred: impl Fn(&Option<usize>) -> bool) -> Vec<usize> {
        self.sizes
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| pred(slot).then_some(i))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_and_free() {
        let mut slots = SlotTable::new(4, 100);
        assert_eq!(slots.free_indices(), vec![0, 1, 2, 3]);
        assert!(slots.live_indices().is_empty());

        assert_eq!(slots.try_allocate(1, 40), Ok(()));
        assert_eq!(slots.try_allocate(3, 60), Ok(()));
        assert_eq!(slots.live_bytes(), 100);
        assert_eq!(slots.remaining_budget(), 0);
        assert_eq!(slots.live_indices(), vec![1, 3]);
        assert_eq!(slots.free_indices(), vec![0, 2]);
        assert_eq!(slots.size_of(3), Some(60));
        assert_eq!(slots.size_of(0), None);

        assert_eq!(slots.try_free(1), Ok(40));
        assert_eq!(slots.live_bytes(), 60);
        assert_eq!(slots.live_count(), 1);
        assert_eq!(slots.free_indices(), vec![0, 1, 2]);
    }

    #[test]
    fn rejections_have_no_side_effects() {
        let mut slots = SlotTable::new(2, 100);
        slots.try_allocate(0, 50).unwrap();

        assert_eq!(slots.try_allocate(0, 10), Err(Rejected::Occupied));
        assert_eq!(slots.try_allocate(1, 51), Err(Rejected::OverBudget));
        assert_eq!(slots.try_allocate(1, 0), Err(Rejected::ZeroSize));
        assert_eq!(slots.try_allocate(2, 1), Err(Rejected::OutOfRange));
        assert_eq!(slots.try_free(1), Err(Rejected::Empty));
        assert_eq!(slots.try_free(7), Err(Rejected::OutOfRange));

        assert_eq!(slots.live_bytes(), 50);
        assert_eq!(slots.live_indices(), vec![0]);
        assert_eq!(slots.size_of(0), Some(50));
    }

    #[test]
    fn double_free_rejected() {
        let mut slots = SlotTable::new(1, 10);
        slots.try_allocate(0, 10).unwrap();
        assert_eq!(slots.try_free(0), Ok(10));
        assert_eq!(slots.try_free(0), Err(Rejected::Empty));
        assert_eq!(slots.try_allocate(0, 10), Ok(()));
    }
}
