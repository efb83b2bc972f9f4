use rand::Rng;

pub const OTP_LEN: usize = 6;

pub const RESET_MAIL_SUBJECT: &str = "Forge Password Assistance - OTP Verification";

/// Source of reset codes, injected so tests can pin the code.
pub trait OtpGenerator: Send + Sync {
    fn generate(&self) -> String;
}

/// Uniformly random 6-digit code, leading zeros preserved.
pub struct RandomOtp;

impl OtpGenerator for RandomOtp {
    fn generate(&self) -> String {
        let n: u32 = rand::thread_rng().gen_range(0..1_000_000);
        format!("{n:06}")
    }
}

pub fn reset_mail_body(code: &str) -> String {
    format!(
        "Forge Password Reset\n\n\
         Dear User,\n\n\
         Your OTP for password reset is: {code}\n\n\
         This code will expire in 5 minutes.\n\
         If you did not request this reset, please ignore this message.\n"
    )
}

#[cfg(test)]
pub struct FixedOtp(pub &'static str);

#[cfg(test)]
impl OtpGenerator for FixedOtp {
    fn generate(&self) -> String {
        self.0.to_string()
    }
}
