use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::api::auth::register,
        crate::api::auth::verify_otp,
        crate::api::auth::login,
        crate::api::payments::initialize_payment,
        crate::api::payments::verify_payment,
        crate::api::instances::list_instances,
        crate::api::instances::pair_instance,
        crate::api::instances::delete_instance
    ),
    components(
        schemas(
            crate::api::auth::RegisterRequest,
            crate::api::auth::VerifyOtpRequest,
            crate::api::auth::LoginRequest,
            crate::api::auth::AuthResponse,
            crate::api::payments::InitializePaymentRequest,
            crate::api::payments::InitializePaymentResponse,
            crate::api::payments::VerifyPaymentRequest,
            crate::api::instances::PairInstanceRequest,
            crate::api::instances::DeleteInstanceRequest,
            crate::models::Transaction,
            crate::models::Instance,
            crate::models::TransactionStatus,
            crate::models::InstanceStatus
        )
    ),
    tags(
        (name = "auth", description = "Registration, OTP verification and login"),
        (name = "payments", description = "Purchase initiation and settlement"),
        (name = "instances", description = "Instance pairing and retirement")
    )
)]
pub struct ApiDoc;
