//! Scoped override of the process default locale.
//!
//! Some OS builds fail to encode the self-signed certificate's dates and subject
//! while a non-English locale is the default, so key generation runs with `en`
//! forced. The previous tag is restored when the guard drops, on every exit path.

use std::sync::Arc;

use crate::platform::LocaleControl;

/// Locale forced while generating the master key pair.
pub const KEYGEN_LOCALE: &str = "en";

/// Restores the saved locale on drop.
#[must_use = "the previous locale is restored as soon as the guard is dropped"]
pub struct LocaleGuard {
    control: Arc<dyn LocaleControl>,
    previous: String,
}

impl LocaleGuard {
    /// Saves the current locale and switches to `tag`.
    pub fn set(control: Arc<dyn LocaleControl>, tag: &str) -> Self {
        let previous = control.current_locale();
        if previous != tag {
            log::debug!("overriding default locale {previous} -> {tag}");
        }
        control.set_locale(tag.to_string());
        Self { control, previous }
    }

    /// The locale that will be restored.
    #[must_use]
    pub fn previous(&self) -> &str {
        &self.previous
    }
}

impl Drop for LocaleGuard {
    fn drop(&mut self) {
        self.control.set_locale(self.previous.clone());
    }
}
