#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition
{
   Previous,
   Next,
   Select(usize),
}

/// Which track is current. Holds nothing until tracks are loaded; afterwards always a valid index.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Selection
{
   current:     Option<usize>,
   track_count: usize,
}

impl Selection
{
   pub fn new() -> Self { Selection::default() }

   /// Resets for a freshly loaded track list; the first track becomes current when there is one.
   pub fn on_loaded(&mut self, track_count: usize) -> Option<usize>
   //--------------------------------------------------------------
   {
      self.track_count = track_count;
      self.current = if track_count > 0 { Some(0) } else { None };
      self.current
   }

   pub fn current(&self) -> Option<usize> { self.current }

   pub fn track_count(&self) -> usize { self.track_count }

   /// Applies a transition and returns the index that is now current, or `None` when the
   /// transition is a no-op (first/last track reached, bad index, nothing loaded). `Select` of
   /// the current track still counts as a transition so the views are refreshed.
   pub fn apply(&mut self, transition: Transition) -> Option<usize>
   //--------------------------------------------------------------
   {
      let current = self.current?;
      let target = match transition
      {
         | Transition::Previous if current > 0 => current - 1,
         | Transition::Next if current + 1 < self.track_count => current + 1,
         | Transition::Select(i) if i < self.track_count => i,
         | Transition::Select(i) =>
         {
            log::warn!("Ignoring selection of track {i}, only {} loaded", self.track_count);
            return None;
         }
         | _ => return None,
      };
      self.current = Some(target);
      Some(target)
   }
}

#[cfg(test)]
mod tests
{
   use super::*;

   #[test]
   fn nothing_happens_before_load()
   {
      let mut selection = Selection::new();
      assert_eq!(selection.current(), None);
      assert_eq!(selection.apply(Transition::Next), None);
      assert_eq!(selection.apply(Transition::Select(0)), None);
      assert_eq!(selection.current(), None);
   }

   #[test]
   fn empty_list_holds_no_selection()
   {
      let mut selection = Selection::new();
      assert_eq!(selection.on_loaded(0), None);
      assert_eq!(selection.apply(Transition::Previous), None);
   }

   #[test]
   fn bounds_are_no_ops()
   {
      let mut selection = Selection::new();
      assert_eq!(selection.on_loaded(3), Some(0));
      assert_eq!(selection.apply(Transition::Previous), None);
      assert_eq!(selection.current(), Some(0));
      assert_eq!(selection.apply(Transition::Next), Some(1));
      assert_eq!(selection.apply(Transition::Next), Some(2));
      assert_eq!(selection.apply(Transition::Next), None);
      assert_eq!(selection.current(), Some(2));
      assert_eq!(selection.apply(Transition::Previous), Some(1));
   }

   #[test]
   fn select_validates_index()
   {
      let mut selection = Selection::new();
      selection.on_loaded(2);
      assert_eq!(selection.apply(Transition::Select(1)), Some(1));
      assert_eq!(selection.apply(Transition::Select(1)), Some(1));
      assert_eq!(selection.apply(Transition::Select(2)), None);
      assert_eq!(selection.current(), Some(1));
   }

   #[test]
   fn reload_resets_to_first_track()
   {
      let mut selection = Selection::new();
      selection.on_loaded(4);
      selection.apply(Transition::Select(3));
      assert_eq!(selection.on_loaded(2), Some(0));
      assert_eq!(selection.track_count(), 2);
   }
}
