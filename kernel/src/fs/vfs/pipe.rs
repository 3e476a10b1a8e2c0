//! Pipe Buffers
//!
//! An anonymous pipe is an in-core inode with no disk identity whose payload
//! carries one page used as a ring buffer. Pages come from a fixed budget.

use alloc::boxed::Box;
use alloc::vec;
use core::fmt;
use spin::Mutex;

use crate::config::PAGE_SIZE;

/// One page of pipe storage
pub struct Page(Box<[u8]>);

impl Page {
    fn new() -> Self {
        Self(vec![0u8; PAGE_SIZE].into_boxed_slice())
    }
}

/// Fixed budget of pages for pipe buffers
pub struct PagePool {
    available: Mutex<usize>,
}

impl PagePool {
    pub const fn new(pages: usize) -> Self {
        Self {
            available: Mutex::new(pages),
        }
    }

    /// Take a zeroed page, or `None` if the budget is spent
    pub fn acquire(&self) -> Option<Page> {
        let mut available = self.available.lock();
        if *available == 0 {
            return None;
        }
        *available -= 1;
        Some(Page::new())
    }

    /// Give a page back to the budget
    pub fn release(&self, page: Page) {
        drop(page);
        *self.available.lock() += 1;
    }

    pub fn available(&self) -> usize {
        *self.available.lock()
    }
}

/// Ring buffer state of a pipe
pub struct PipeBuffer {
    page: Page,
    head: usize,
    len: usize,
}

impl PipeBuffer {
    pub fn new(page: Page) -> Self {
        Self { page, head: 0, len: 0 }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn capacity(&self) -> usize {
        self.page.0.len()
    }

    /// Append as much of `buf` as fits; returns the number of bytes taken
    pub fn write(&mut self, buf: &[u8]) -> usize {
        let cap = self.capacity();
        let n = core::cmp::min(buf.len(), cap - self.len);
        for (i, &b) in buf[..n].iter().enumerate() {
            self.page.0[(self.head + self.len + i) % cap] = b;
        }
        self.len += n;
        n
    }

    /// Drain up to `buf.len()` bytes; returns the number of bytes read
    pub fn read(&mut self, buf: &mut [u8]) -> usize {
        let cap = self.capacity();
        let n = core::cmp::min(buf.len(), self.len);
        for (i, b) in buf[..n].iter_mut().enumerate() {
            *b = self.page.0[(self.head + i) % cap];
        }
        self.head = (self.head + n) % cap;
        self.len -= n;
        n
    }

    /// Hand the page back
    pub fn into_page(self) -> Page {
        self.page
    }
}

impl fmt::Debug for PipeBuffer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipeBuffer")
            .field("head", &self.head)
            .field("len", &self.len)
            .finish()
    }
}
