use crate::error::{AppError, AppResult};
use crate::external::RemoteService;
use crate::flow::session::{FlowSession, SessionKey, SessionRegistry};
use crate::flow::settlement::{PurchaseOrder, SettlementCoordinator};
use crate::flow::state::FlowState;
use crate::models::{ActionEnvelope, InboundAction, Reply};
use crate::store::LedgerStore;
use crate::utils::{validate_destination_msisdn, validate_login_msisdn};
use std::sync::Arc;

const MAX_PACKAGE_OPTIONS: usize = 25;

const INFRA_FAILURE_MSG: &str = "Terjadi kesalahan pada sistem. Silakan coba lagi nanti.";

/// Drives every conversation flow: maps (current state, inbound action) to
/// staged data and the next state, or a terminal outcome. One instance
/// serves all sessions; per-session ordering comes from the registry's
/// session mutex, held for the whole transition.
#[derive(Clone)]
pub struct Dispatcher {
    store: Arc<dyn LedgerStore>,
    remote: Arc<dyn RemoteService>,
    settlement: SettlementCoordinator,
    registry: SessionRegistry,
}

impl Dispatcher {
    pub fn new(
        store: Arc<dyn LedgerStore>,
        remote: Arc<dyn RemoteService>,
        payment_method: String,
    ) -> Self {
        let settlement = SettlementCoordinator::new(store.clone(), remote.clone(), payment_method);
        Self {
            store,
            remote,
            settlement,
            registry: SessionRegistry::new(),
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub async fn handle(&self, envelope: ActionEnvelope) -> AppResult<Reply> {
        let key = SessionKey {
            user_id: envelope.user_id,
            chat_id: envelope.chat_id,
        };
        let session = self.registry.entry(key);
        let mut session = session.lock().await;
        session.touch();

        match envelope.action.clone() {
            InboundAction::Cancel => {
                session.clear();
                Ok(main_menu("Operasi dibatalkan."))
            }
            InboundAction::SessionTimeout => {
                session.clear();
                Ok(Reply::text(
                    "Sesi berakhir karena tidak ada aktivitas. Ketik /start untuk memulai lagi.",
                ))
            }
            InboundAction::Text { text } => self.on_text(&mut session, text.trim()).await,
            InboundAction::Choice { data } => self.on_choice(&mut session, &envelope, &data).await,
        }
    }

    async fn on_text(&self, session: &mut FlowSession, text: &str) -> AppResult<Reply> {
        match session.state.clone() {
            FlowState::PurchaseAskPhone => self.on_purchase_phone(session, text).await,
            FlowState::OtpAskPhone => self.on_otp_phone(session, text).await,
            FlowState::OtpAskCode { phone, auth_id } => {
                self.on_otp_code(session, &phone, &auth_id, text).await
            }
            FlowState::PurchaseAskPackage { .. } | FlowState::PurchaseConfirm { .. } => {
                // These states advance through choice selections only.
                Ok(Reply::text("Silakan gunakan tombol pilihan."))
            }
            FlowState::Idle | FlowState::Panel { .. } => {
                Ok(main_menu("Silakan pilih dari menu:"))
            }
        }
    }

    async fn on_choice(
        &self,
        session: &mut FlowSession,
        envelope: &ActionEnvelope,
        data: &str,
    ) -> AppResult<Reply> {
        match data {
            "start" | "menu" => {
                if let Err(e) = self
                    .store
                    .find_or_create_user(
                        envelope.user_id,
                        &envelope.name,
                        envelope.username.as_deref(),
                    )
                    .await
                {
                    log::error!("User registration for {} failed: {e}", envelope.user_id);
                }
                session.clear();
                Ok(main_menu(
                    "Selamat Datang di Bot Pembelian Paket Data!\n\nGunakan menu di bawah untuk memulai.",
                ))
            }
            "close_menu" => {
                session.clear();
                Ok(Reply::text("Menu ditutup. Ketik /start untuk membuka lagi."))
            }
            "purchase_start" => {
                session.state = FlowState::PurchaseAskPhone;
                Ok(Reply::text(
                    "Silakan masukkan nomor XL/Axis tujuan (contoh: 087812345678).",
                ))
            }
            "panel_menu" => match session.state.clone() {
                FlowState::Panel { phone, .. } => Ok(panel_menu(&format!(
                    "Anda sudah login dengan nomor: {phone}\nSilakan pilih menu panel:"
                ))),
                _ => {
                    session.state = FlowState::OtpAskPhone;
                    Ok(Reply::text(
                        "Untuk mengakses Panel XL, silakan login terlebih dahulu.\n\nMasukkan nomor XL/Axis Anda (format: 628...):",
                    ))
                }
            },
            "confirm_yes" => match session.state.clone() {
                FlowState::PurchaseConfirm {
                    phone,
                    package_code,
                    package_name,
                    price_final,
                    provider_fee,
                } => {
                    let order = PurchaseOrder {
                        phone,
                        package_code,
                        package_name,
                        price_final,
                        provider_fee,
                    };
                    self.on_confirmed(session, envelope.user_id, order).await
                }
                _ => Ok(invalid_button()),
            },
            "confirm_no" => match session.state {
                FlowState::PurchaseConfirm { .. } => {
                    session.clear();
                    Ok(main_menu("Dibatalkan. Kembali ke menu utama."))
                }
                _ => Ok(invalid_button()),
            },
            _ if data.starts_with("pkg_") => match session.state.clone() {
                FlowState::PurchaseAskPackage { phone } => {
                    let code = data.trim_start_matches("pkg_");
                    self.on_package_selected(session, envelope.user_id, &phone, code)
                        .await
                }
                _ => Ok(invalid_button()),
            },
            "panel_pulsa" | "panel_lokasi" | "panel_paket" => {
                match session.state.clone() {
                    FlowState::Panel { access_token, .. } => {
                        self.on_panel_query(data, &access_token).await
                    }
                    // Missing/expired token routes back to re-authentication.
                    _ => {
                        session.state = FlowState::OtpAskPhone;
                        Ok(Reply::text(
                            "Sesi berakhir. Silakan login kembali.\n\nMasukkan nomor XL/Axis Anda (format: 628...):",
                        ))
                    }
                }
            }
            _ if data.starts_with("unreg_") => match session.state.clone() {
                FlowState::Panel { access_token, .. } => {
                    let encrypted_code = data.trim_start_matches("unreg_");
                    let result = self.remote.unreg_package(&access_token, encrypted_code).await;
                    if result.status {
                        Ok(panel_menu("Paket berhasil dihentikan. Silakan cek ulang."))
                    } else {
                        Ok(panel_menu(&format!("Gagal: {}", result.message())))
                    }
                }
                _ => {
                    session.state = FlowState::OtpAskPhone;
                    Ok(Reply::text(
                        "Sesi berakhir. Silakan login kembali.\n\nMasukkan nomor XL/Axis Anda (format: 628...):",
                    ))
                }
            },
            "panel_logout" => {
                session.clear();
                Ok(main_menu("Anda telah keluar dari Panel XL."))
            }
            _ => {
                log::warn!("Unhandled choice payload: {data}");
                Ok(invalid_button())
            }
        }
    }

    async fn on_purchase_phone(&self, session: &mut FlowSession, text: &str) -> AppResult<Reply> {
        if let Err(AppError::ValidationError(msg)) = validate_destination_msisdn(text) {
            // Re-prompt in place; nothing is staged.
            return Ok(Reply::text(format!("{msg} Silakan coba lagi.")));
        }

        let packages = match self.store.list_active_packages().await {
            Ok(packages) => packages,
            Err(e) => {
                log::error!("Catalog fetch failed: {e}");
                session.clear();
                return Ok(Reply::text(INFRA_FAILURE_MSG));
            }
        };
        if packages.is_empty() {
            session.clear();
            return Ok(Reply::text("Gagal mengambil daftar paket. Coba lagi nanti."));
        }

        let mut reply = Reply::text("Silakan pilih paket:");
        for package in packages.iter().take(MAX_PACKAGE_OPTIONS) {
            reply = reply.with_option(
                format!("{} - Rp{}", package.name, package.final_price()),
                format!("pkg_{}", package.code),
            );
        }
        session.state = FlowState::PurchaseAskPackage {
            phone: text.to_string(),
        };
        Ok(reply)
    }

    async fn on_package_selected(
        &self,
        session: &mut FlowSession,
        user_id: i64,
        phone: &str,
        code: &str,
    ) -> AppResult<Reply> {
        let package = match self.store.get_package(code).await {
            Ok(Some(package)) => package,
            Ok(None) => {
                // Unknown selection: re-prompt, the staged phone stays.
                return Ok(Reply::text(
                    "Paket tidak dikenal. Silakan pilih dari tombol yang tersedia.",
                ));
            }
            Err(e) => {
                log::error!("Package lookup for {code} failed: {e}");
                session.clear();
                return Ok(Reply::text(INFRA_FAILURE_MSG));
            }
        };

        let balance_info = match self.store.get_balance(user_id).await {
            Ok(Some(info)) => info,
            Ok(None) => {
                log::error!("No ledger account for user {user_id}");
                session.clear();
                return Ok(Reply::text("Gagal mengambil data user/paket."));
            }
            Err(e) => {
                log::error!("Balance lookup for user {user_id} failed: {e}");
                session.clear();
                return Ok(Reply::text(INFRA_FAILURE_MSG));
            }
        };

        let price_final = package.final_price();
        if balance_info.balance < price_final {
            // No retry from here; the user must restart the flow.
            session.clear();
            return Ok(Reply::text(format!(
                "Saldo Anda (Rp{}) tidak cukup.",
                balance_info.balance
            )));
        }

        let remaining = balance_info.balance - price_final;
        let text = format!(
            "Konfirmasi Pembelian\n\nNomor: {phone}\nPaket: {}\nHarga: Rp{price_final}\nSisa saldo setelah pembelian: Rp{remaining}\n\nAnda yakin ingin melanjutkan?",
            package.name
        );
        session.state = FlowState::PurchaseConfirm {
            phone: phone.to_string(),
            package_code: package.code.clone(),
            package_name: package.name.clone(),
            price_final,
            provider_fee: package.fee(),
        };
        Ok(Reply::text(text)
            .with_option("Ya, Lanjutkan", "confirm_yes")
            .with_option("Batal", "confirm_no"))
    }

    async fn on_confirmed(
        &self,
        session: &mut FlowSession,
        user_id: i64,
        order: PurchaseOrder,
    ) -> AppResult<Reply> {
        // The session mutex is held across the settlement call, so neither
        // cancellation nor the idle sweep can interrupt it.
        let outcome = match self.settlement.settle(user_id, &order).await {
            Ok(outcome) => outcome,
            Err(e) => {
                log::error!("Settlement for user {user_id} failed: {e}");
                session.clear();
                return Ok(Reply::text(INFRA_FAILURE_MSG));
            }
        };

        session.clear();
        if outcome.success {
            Ok(main_menu(&format!(
                "BERHASIL!\n\n{}\nID Transaksi: {}",
                outcome.message, outcome.transaction_id
            )))
        } else {
            Ok(main_menu(&format!("GAGAL!\n\n{}", outcome.message)))
        }
    }

    async fn on_otp_phone(&self, session: &mut FlowSession, text: &str) -> AppResult<Reply> {
        if let Err(AppError::ValidationError(msg)) = validate_login_msisdn(text) {
            return Ok(Reply::text(format!("{msg} Coba lagi:")));
        }

        let result = self.remote.request_otp(text).await;
        if !result.status {
            // Stay on AskPhone, surfacing the remote message verbatim.
            return Ok(Reply::text(format!(
                "Gagal: {}\n\nCoba lagi atau batalkan.",
                result.message()
            )));
        }
        let Some(auth_id) = result.data_str("auth_id") else {
            log::error!("OTP request for {text} returned no auth_id");
            return Ok(Reply::text(
                "Gagal: respons server tidak lengkap.\n\nCoba lagi atau batalkan.",
            ));
        };

        session.state = FlowState::OtpAskCode {
            phone: text.to_string(),
            auth_id,
        };
        Ok(Reply::text(
            "OTP berhasil terkirim! Masukkan 6 digit kode OTP di sini.",
        ))
    }

    async fn on_otp_code(
        &self,
        session: &mut FlowSession,
        phone: &str,
        auth_id: &str,
        code: &str,
    ) -> AppResult<Reply> {
        let result = self.remote.login_with_otp(phone, auth_id, code).await;
        if !result.status {
            // Wrong code re-prompts AskCode, not AskPhone.
            return Ok(Reply::text(format!(
                "Gagal: {}\n\nMasukkan kode lagi, atau batalkan.",
                result.message()
            )));
        }
        let Some(access_token) = result.data_str("access_token") else {
            log::error!("OTP login for {phone} returned no access_token");
            return Ok(Reply::text(
                "Gagal: respons server tidak lengkap.\n\nMasukkan kode lagi, atau batalkan.",
            ));
        };

        session.state = FlowState::Panel {
            phone: phone.to_string(),
            access_token,
        };
        Ok(panel_menu(&format!(
            "Login Berhasil! Panel XL untuk nomor {phone} aktif."
        )))
    }

    async fn on_panel_query(&self, data: &str, access_token: &str) -> AppResult<Reply> {
        match data {
            "panel_pulsa" => {
                let result = self.remote.subscriber_info(access_token).await;
                if !result.status {
                    return Ok(panel_menu(&format!("Gagal: {}", result.message())));
                }
                let field = |key: &str| result.data_str(key).unwrap_or_else(|| "-".to_string());
                Ok(panel_menu(&format!(
                    "Informasi Pulsa & Nomor\n\nNomor: {}\nStatus: {}\nPulsa Utama: {}\nMasa Aktif s/d: {}",
                    field("msisdn"),
                    field("subscription_status"),
                    field("pulsa_real"),
                    field("active_until"),
                )))
            }
            "panel_lokasi" => {
                let result = self.remote.subscriber_location(access_token).await;
                if !result.status {
                    return Ok(panel_menu(&format!("Gagal: {}", result.message())));
                }
                let location = result.data_str("location").unwrap_or_else(|| "-".to_string());
                Ok(panel_menu(&format!("Lokasi Terdeteksi:\n{location}")))
            }
            "panel_paket" => {
                let result = self.remote.quota_details(access_token).await;
                let quotas = result
                    .data
                    .as_ref()
                    .and_then(|d| d.get("quotas"))
                    .and_then(|q| q.as_array())
                    .cloned()
                    .unwrap_or_default();
                if !result.status || quotas.is_empty() {
                    let message = if result.message().is_empty() {
                        "Tidak ada paket aktif.".to_string()
                    } else {
                        result.message().to_string()
                    };
                    return Ok(panel_menu(&message));
                }

                let mut text = String::from("Daftar Paket Aktif Anda:\n");
                let mut reply = Reply::text("");
                for quota in &quotas {
                    let name = quota.get("name").and_then(|v| v.as_str()).unwrap_or("-");
                    let expired_at = quota
                        .get("expired_at")
                        .and_then(|v| v.as_str())
                        .unwrap_or("-");
                    text.push_str(&format!("\n{name}\n   Expired: {expired_at}\n"));
                    if let Some(code) = quota
                        .get("encrypted_package_code")
                        .and_then(|v| v.as_str())
                    {
                        reply = reply.with_option(format!("Stop: {name}"), format!("unreg_{code}"));
                    }
                }
                reply.text = text;
                Ok(reply.with_option("Kembali ke Panel", "panel_menu"))
            }
            _ => Ok(invalid_button()),
        }
    }
}

fn main_menu(text: &str) -> Reply {
    Reply::text(text)
        .with_option("Beli Paket Data XL", "purchase_start")
        .with_option("Panel XL", "panel_menu")
        .with_option("Tutup Menu", "close_menu")
}

fn panel_menu(text: &str) -> Reply {
    Reply::text(text)
        .with_option("Cek Pulsa", "panel_pulsa")
        .with_option("Cek Lokasi", "panel_lokasi")
        .with_option("Cek Paket Aktif", "panel_paket")
        .with_option("Logout", "panel_logout")
}

fn invalid_button() -> Reply {
    Reply::text("Tombol tidak valid.")
}
