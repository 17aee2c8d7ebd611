//! Reading passphrases and answers from the controlling terminal.
//!
//! On Unix the terminal device is opened directly, so redirecting stdin
//! cannot feed or capture a passphrase. While a secret is being typed,
//! echo is off and SIGINT, SIGTSTP and SIGQUIT are blocked; both are
//! restored by guards on every exit path, terminal state first.

use std::io::{ErrorKind, Read};

use zeroize::Zeroizing;

use crate::error::KeyError;
use crate::secret::SecretBytes;

/// Longest accepted passphrase in bytes.
pub const MAX_SECRET_LEN: usize = 1024;

/// Prompts on the terminal and reads a secret with echo disabled.
///
/// The trailing newline is not part of the result.
pub fn read_secret(prompt: &str) -> Result<SecretBytes, KeyError> {
    imp::read_secret(prompt)
}

/// Prompts on the terminal and reads one line with echo enabled.
pub fn read_line(prompt: &str) -> Result<String, KeyError> {
    imp::read_line(prompt)
}

/// Reads bytes one at a time until a newline or end of input.
///
/// On error the partial input is wiped before returning.
#[cfg_attr(not(unix), allow(dead_code))]
pub(crate) fn read_until_newline<R: Read>(reader: &mut R) -> Result<SecretBytes, KeyError> {
    let mut buf = SecretBytes::zeroed(MAX_SECRET_LEN)?;
    let mut byte = Zeroizing::new([0u8; 1]);
    let mut len = 0;

    loop {
        match reader.read(&mut *byte) {
            Ok(0) => break,
            Ok(_) if byte[0] == b'\n' => break,
            Ok(_) => {
                if len == MAX_SECRET_LEN {
                    return Err(KeyError::InvalidArgument("passphrase too long"));
                }
                buf[len] = byte[0];
                len += 1;
            }
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e.into()),
        }
    }

    buf.truncate(len);
    Ok(buf)
}

#[cfg(unix)]
mod imp {
    use std::fs::{File, OpenOptions};
    use std::io::{self, BufRead, BufReader, Write};
    use std::mem::MaybeUninit;
    use std::os::unix::io::{AsRawFd, RawFd};

    use super::read_until_newline;
    use crate::error::KeyError;
    use crate::secret::SecretBytes;

    const TTY_PATH: &str = "/dev/tty";

    /// Blocks interrupt and job-control signals until dropped.
    struct SignalMask {
        saved: libc::sigset_t,
    }

    impl SignalMask {
        fn block_interrupts() -> io::Result<Self> {
            // SAFETY: both sets are initialised by sigemptyset/pthread_sigmask
            // before they are read.
            unsafe {
                let mut set = MaybeUninit::<libc::sigset_t>::uninit();
                libc::sigemptyset(set.as_mut_ptr());
                let mut set = set.assume_init();
                for signal in [libc::SIGINT, libc::SIGTSTP, libc::SIGQUIT] {
                    libc::sigaddset(&mut set, signal);
                }

                let mut saved = MaybeUninit::<libc::sigset_t>::uninit();
                let rc = libc::pthread_sigmask(libc::SIG_BLOCK, &set, saved.as_mut_ptr());
                if rc != 0 {
                    return Err(io::Error::from_raw_os_error(rc));
                }
                Ok(Self {
                    saved: saved.assume_init(),
                })
            }
        }
    }

    impl Drop for SignalMask {
        fn drop(&mut self) {
            // SAFETY: `saved` holds the mask returned by pthread_sigmask.
            unsafe {
                libc::pthread_sigmask(libc::SIG_SETMASK, &self.saved, std::ptr::null_mut());
            }
        }
    }

    /// Turns terminal echo off until dropped.
    struct EchoOff {
        fd: RawFd,
        saved: libc::termios,
    }

    impl EchoOff {
        fn disable(fd: RawFd) -> io::Result<Self> {
            let mut saved = MaybeUninit::<libc::termios>::uninit();
            // SAFETY: tcgetattr fills `saved` when it returns 0.
            if unsafe { libc::tcgetattr(fd, saved.as_mut_ptr()) } != 0 {
                return Err(io::Error::last_os_error());
            }
            let saved = unsafe { saved.assume_init() };

            let mut quiet = saved;
            quiet.c_lflag &= !(libc::ECHO | libc::ECHOE | libc::ECHOK | libc::ECHONL);
            // SAFETY: `quiet` is a valid termios copied from the device.
            if unsafe { libc::tcsetattr(fd, libc::TCSAFLUSH, &quiet) } != 0 {
                return Err(io::Error::last_os_error());
            }

            Ok(Self { fd, saved })
        }
    }

    impl Drop for EchoOff {
        fn drop(&mut self) {
            // SAFETY: restores the attributes read in `disable`.
            unsafe {
                libc::tcsetattr(self.fd, libc::TCSAFLUSH, &self.saved);
            }
        }
    }

    fn open_tty() -> io::Result<File> {
        OpenOptions::new().read(true).write(true).open(TTY_PATH)
    }

    pub(super) fn read_secret(prompt: &str) -> Result<SecretBytes, KeyError> {
        let mut tty = open_tty()?;
        tty.write_all(prompt.as_bytes())?;
        tty.flush()?;

        let secret = {
            let _signals = SignalMask::block_interrupts()?;
            let _echo = EchoOff::disable(tty.as_raw_fd())?;
            read_until_newline(&mut tty)?
        };

        tty.write_all(b"\n")?;
        Ok(secret)
    }

    pub(super) fn read_line(prompt: &str) -> Result<String, KeyError> {
        let mut tty = open_tty()?;
        tty.write_all(prompt.as_bytes())?;
        tty.flush()?;

        let mut line = String::new();
        BufReader::new(tty).read_line(&mut line)?;
        Ok(line.trim_end().to_string())
    }
}

#[cfg(not(unix))]
mod imp {
    use std::io::{self, BufRead, Write};

    use crate::error::KeyError;
    use crate::secret::SecretBytes;

    pub(super) fn read_secret(prompt: &str) -> Result<SecretBytes, KeyError> {
        let secret = rpassword::prompt_password(prompt)?;
        Ok(SecretBytes::from(secret))
    }

    pub(super) fn read_line(prompt: &str) -> Result<String, KeyError> {
        let mut stderr = io::stderr();
        stderr.write_all(prompt.as_bytes())?;
        stderr.flush()?;

        let mut line = String::new();
        io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim_end().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{self, Cursor};

    #[test]
    fn reads_up_to_newline() {
        let mut input = Cursor::new(b"correct horse\nleftover".to_vec());
        let secret = read_until_newline(&mut input).unwrap();
        assert_eq!(&*secret, b"correct horse");
    }

    #[test]
    fn end_of_input_terminates_secret() {
        let mut input = Cursor::new(b"no newline".to_vec());
        let secret = read_until_newline(&mut input).unwrap();
        assert_eq!(&*secret, b"no newline");
    }

    #[test]
    fn empty_line_gives_empty_secret() {
        let mut input = Cursor::new(b"\n".to_vec());
        assert!(read_until_newline(&mut input).unwrap().is_empty());
    }

    #[test]
    fn overlong_input_is_rejected() {
        let mut input = Cursor::new(vec![b'a'; MAX_SECRET_LEN + 1]);
        assert!(matches!(
            read_until_newline(&mut input),
            Err(KeyError::InvalidArgument(_))
        ));
    }

    #[test]
    fn longest_allowed_input_is_accepted() {
        let mut input = Cursor::new(vec![b'a'; MAX_SECRET_LEN]);
        assert_eq!(read_until_newline(&mut input).unwrap().len(), MAX_SECRET_LEN);
    }

    struct FailingReader {
        served: usize,
    }

    impl Read for FailingReader {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.served < 3 {
                self.served += 1;
                buf[0] = b'x';
                Ok(1)
            } else {
                Err(io::Error::new(ErrorKind::BrokenPipe, "terminal went away"))
            }
        }
    }

    #[test]
    fn read_error_is_propagated() {
        let mut reader = FailingReader { served: 0 };
        assert!(matches!(
            read_until_newline(&mut reader),
            Err(KeyError::Io(_))
        ));
    }
}
