//! Email corpus splitting and batching.
//!
//! A raw corpus is a single text blob holding zero or more emails joined by
//! a separator token. The [`Batcher`] splits it lazily, caps the number of
//! emails considered per run, and groups the survivors into fixed-size
//! [`EmailBatch`]es, one per extraction call.
//!
//! # Example
//!
//! ```rust
//! use event_harvester_core::batch::{Batcher, SEPARATOR};
//!
//! let raw = format!("first{sep}second{sep}third{sep}fourth", sep = SEPARATOR);
//! let batcher = Batcher::default();
//! let batches: Vec<_> = batcher.batches(&raw).collect();
//! assert_eq!(batches.len(), 2);
//! assert_eq!(batches[0].emails, vec!["first", "second", "third"]);
//! assert_eq!(batches[1].number, 2);
//! ```

/// Literal token separating emails in the raw corpus.
pub const SEPARATOR: &str = "***** SEPARATION *****";

/// Emails considered per invocation; the remainder is dropped silently.
pub const MAX_EMAILS: usize = 12;

/// Emails per extraction call.
pub const BATCH_SIZE: usize = 3;

/// Splits a corpus into emails and groups them into batches.
#[derive(Debug, Clone)]
pub struct Batcher {
    separator: String,
    max_emails: usize,
    batch_size: usize,
}

impl Default for Batcher {
    fn default() -> Self {
        Self::new(SEPARATOR, MAX_EMAILS, BATCH_SIZE)
    }
}

impl Batcher {
    /// A `batch_size` of zero is treated as one.
    pub fn new(separator: impl Into<String>, max_emails: usize, batch_size: usize) -> Self {
        Self {
            separator: separator.into(),
            max_emails,
            batch_size: batch_size.max(1),
        }
    }

    /// Iterate over the (capped) email bodies in `raw`.
    ///
    /// Bodies are trimmed; blank segments are skipped and do not count
    /// towards the cap. Without a separator the whole input is one email.
    pub fn emails<'a>(&'a self, raw: &'a str) -> Emails<'a> {
        Emails {
            rest: Some(raw),
            separator: &self.separator,
            remaining: self.max_emails,
        }
    }

    /// Iterate over batches of at most `batch_size` emails.
    pub fn batches<'a>(&'a self, raw: &'a str) -> Batches<'a> {
        Batches {
            emails: self.emails(raw),
            batch_size: self.batch_size,
            next_number: 1,
        }
    }
}

/// Lazy iterator over email bodies. Cloning restarts from the clone point.
#[derive(Debug, Clone)]
pub struct Emails<'a> {
    rest: Option<&'a str>,
    separator: &'a str,
    remaining: usize,
}

impl<'a> Iterator for Emails<'a> {
    type Item = &'a str;

    fn next(&mut self) -> Option<&'a str> {
        while self.remaining > 0 {
            let rest = self.rest?;
            let (head, tail) = if self.separator.is_empty() {
                (rest, None)
            } else {
                match rest.split_once(self.separator) {
                    Some((head, tail)) => (head, Some(tail)),
                    None => (rest, None),
                }
            };
            self.rest = tail;

            let body = head.trim();
            if !body.is_empty() {
                self.remaining -= 1;
                return Some(body);
            }
        }
        None
    }
}

/// A group of emails sent to the model in one call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailBatch<'a> {
    /// 1-based position of the batch within the run.
    pub number: usize,
    pub emails: Vec<&'a str>,
}

impl EmailBatch<'_> {
    /// The batch text as sent to the model: bodies joined by blank lines.
    pub fn text(&self) -> String {
        self.emails.join("\n\n")
    }

    pub fn len(&self) -> usize {
        self.emails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.emails.is_empty()
    }
}

/// Lazy iterator over [`EmailBatch`]es.
#[derive(Debug, Clone)]
pub struct Batches<'a> {
    emails: Emails<'a>,
    batch_size: usize,
    next_number: usize,
}

impl<'a> Iterator for Batches<'a> {
    type Item = EmailBatch<'a>;

    fn next(&mut self) -> Option<EmailBatch<'a>> {
        let emails: Vec<&'a str> = self.emails.by_ref().take(self.batch_size).collect();
        if emails.is_empty() {
            return None;
        }
        let number = self.next_number;
        self.next_number += 1;
        Some(EmailBatch { number, emails })
    }
}
